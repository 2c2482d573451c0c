//! Snapshot export service.
//!
//! Walks the content graph outward from a selection so the resulting
//! snapshot never references an entity it does not contain.

use crate::io::codec;
use crate::io::snapshot::{
    ExportKind, Snapshot, SnapshotExtract, SnapshotMetadata, SnapshotTheme, SnapshotThemeGroup,
};
use crate::models::{EntityKind, ExtractId, ThemeGroupId, ThemeId};
use crate::storage::{ContentStore, StoreContents};
use crate::{Error, Result};
use chrono::Utc;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// What to export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection {
    /// These themes and every extract that references them.
    Themes(Vec<ThemeId>),
    /// These groups, their member themes, and those themes' extracts.
    ThemeGroups(Vec<ThemeGroupId>),
    /// These extracts and the themes they reference.
    Extracts(Vec<ExtractId>),
    /// The whole store.
    All,
}

impl Selection {
    /// Builds a selection from a kind and raw IDs.
    ///
    /// IDs are ignored for [`ExportKind::All`].
    pub fn from_kind(kind: ExportKind, ids: Vec<String>) -> Result<Self> {
        let selection = match kind {
            ExportKind::Themes => Self::Themes(ids.into_iter().map(ThemeId::from).collect()),
            ExportKind::ThemeGroups => {
                Self::ThemeGroups(ids.into_iter().map(ThemeGroupId::from).collect())
            },
            ExportKind::Extracts => Self::Extracts(ids.into_iter().map(ExtractId::from).collect()),
            ExportKind::All => Self::All,
        };
        if selection.is_empty() {
            return Err(Error::InvalidInput(format!(
                "export of {kind} requires at least one ID"
            )));
        }
        Ok(selection)
    }

    /// The export kind of this selection.
    #[must_use]
    pub const fn kind(&self) -> ExportKind {
        match self {
            Self::Themes(_) => ExportKind::Themes,
            Self::ThemeGroups(_) => ExportKind::ThemeGroups,
            Self::Extracts(_) => ExportKind::Extracts,
            Self::All => ExportKind::All,
        }
    }

    fn is_empty(&self) -> bool {
        match self {
            Self::Themes(ids) => ids.is_empty(),
            Self::ThemeGroups(ids) => ids.is_empty(),
            Self::Extracts(ids) => ids.is_empty(),
            Self::All => false,
        }
    }
}

/// An encoded export ready to be written.
#[derive(Debug, Clone)]
pub struct ExportBundle {
    /// Pretty-printed snapshot JSON.
    pub data: Vec<u8>,
    /// Suggested file name.
    pub file_name: String,
    /// Snapshot metadata.
    pub metadata: SnapshotMetadata,
}

/// Service for exporting content selections as snapshots.
pub struct ExportService {
    store: Arc<dyn ContentStore>,
}

impl ExportService {
    /// Creates a new export service.
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Builds the snapshot for a selection.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an empty non-`All` selection and
    /// [`Error::NotFound`] if any selected ID does not exist.
    #[instrument(skip(self), fields(operation = "assemble_snapshot", kind = %selection.kind()))]
    pub fn assemble(&self, selection: &Selection) -> Result<Snapshot> {
        if selection.is_empty() {
            return Err(Error::InvalidInput(format!(
                "export of {} requires at least one ID",
                selection.kind()
            )));
        }

        let contents = self.store.load_contents()?;
        let mut snapshot = match selection {
            Selection::Themes(ids) => themes_walk(&contents, ids)?,
            Selection::ThemeGroups(ids) => groups_walk(&contents, ids)?,
            Selection::Extracts(ids) => extracts_walk(&contents, ids)?,
            Selection::All => Snapshot {
                themes: contents.themes.iter().map(SnapshotTheme::from).collect(),
                theme_groups: contents
                    .theme_groups
                    .iter()
                    .map(SnapshotThemeGroup::from)
                    .collect(),
                extracts: contents.extracts.iter().map(SnapshotExtract::from).collect(),
                ..Snapshot::new()
            },
        };

        snapshot.metadata.export_type = Some(selection.kind());
        snapshot.metadata.exported_at = Some(Utc::now());
        snapshot.refresh_totals();
        Ok(snapshot)
    }

    /// Assembles and encodes a selection.
    #[instrument(skip(self), fields(operation = "export_selection", kind = %selection.kind()))]
    pub fn export_selection(&self, selection: &Selection) -> Result<ExportBundle> {
        let start = Instant::now();
        let snapshot = self.assemble(selection)?;
        let data = codec::encode(&snapshot)?;

        tracing::info!(
            kind = %selection.kind(),
            themes = snapshot.metadata.total_themes,
            theme_groups = snapshot.metadata.total_theme_groups,
            extracts = snapshot.metadata.total_extracts,
            bytes = data.len(),
            duration_ms = start.elapsed().as_millis(),
            "Export assembled"
        );

        Ok(ExportBundle {
            data,
            file_name: codec::suggested_file_name(selection.kind()),
            metadata: snapshot.metadata,
        })
    }

    /// Exports a selection into a directory under its suggested file name.
    ///
    /// Returns the bundle and the path written.
    pub fn export_to_dir(&self, selection: &Selection, dir: &Path) -> Result<(ExportBundle, PathBuf)> {
        let bundle = self.export_selection(selection)?;
        let path = dir.join(&bundle.file_name);
        write_file(&path, &bundle.data)?;
        Ok((bundle, path))
    }

    /// Exports a selection to an explicit path.
    pub fn export_to_file(&self, selection: &Selection, path: &Path) -> Result<ExportBundle> {
        let bundle = self.export_selection(selection)?;
        write_file(path, &bundle.data)?;
        Ok(bundle)
    }
}

fn write_file(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
            operation: "create_export_dir".to_string(),
            cause: e.to_string(),
        })?;
    }
    std::fs::write(path, data).map_err(|e| Error::OperationFailed {
        operation: "write_export_file".to_string(),
        cause: e.to_string(),
    })
}

fn require_all<'a, I, T>(kind: EntityKind, ids: &'a [T], live: I) -> Result<HashSet<&'a T>>
where
    I: Iterator<Item = &'a T>,
    T: Eq + std::hash::Hash + std::fmt::Display + 'a,
{
    let live: HashSet<&T> = live.collect();
    let mut selected = HashSet::with_capacity(ids.len());
    for id in ids {
        if !live.contains(id) {
            return Err(Error::NotFound {
                kind,
                id: id.to_string(),
            });
        }
        selected.insert(id);
    }
    Ok(selected)
}

fn themes_walk(contents: &StoreContents, ids: &[ThemeId]) -> Result<Snapshot> {
    let selected = require_all(EntityKind::Theme, ids, contents.themes.iter().map(|t| &t.id))?;
    Ok(collect(contents, &selected, &HashSet::new(), |e| {
        e.theme_id.as_ref().is_some_and(|t| selected.contains(t))
    }))
}

fn groups_walk(contents: &StoreContents, ids: &[ThemeGroupId]) -> Result<Snapshot> {
    let selected = require_all(
        EntityKind::ThemeGroup,
        ids,
        contents.theme_groups.iter().map(|g| &g.id),
    )?;
    let themes: HashSet<&ThemeId> = contents
        .theme_groups
        .iter()
        .filter(|g| selected.contains(&g.id))
        .flat_map(|g| g.theme_ids.iter())
        .collect();
    Ok(collect(contents, &themes, &selected, |e| {
        e.theme_id.as_ref().is_some_and(|t| themes.contains(t))
    }))
}

fn extracts_walk(contents: &StoreContents, ids: &[ExtractId]) -> Result<Snapshot> {
    let selected = require_all(
        EntityKind::Extract,
        ids,
        contents.extracts.iter().map(|e| &e.id),
    )?;
    let themes: HashSet<&ThemeId> = contents
        .extracts
        .iter()
        .filter(|e| selected.contains(&e.id))
        .filter_map(|e| e.theme_id.as_ref())
        .collect();
    Ok(collect(contents, &themes, &HashSet::new(), |e| {
        selected.contains(&e.id)
    }))
}

/// Copies the chosen entities in store order.
fn collect(
    contents: &StoreContents,
    themes: &HashSet<&ThemeId>,
    groups: &HashSet<&ThemeGroupId>,
    include_extract: impl Fn(&crate::models::Extract) -> bool,
) -> Snapshot {
    Snapshot {
        themes: contents
            .themes
            .iter()
            .filter(|t| themes.contains(&t.id))
            .map(SnapshotTheme::from)
            .collect(),
        theme_groups: contents
            .theme_groups
            .iter()
            .filter(|g| groups.contains(&g.id))
            .map(SnapshotThemeGroup::from)
            .collect(),
        extracts: contents
            .extracts
            .iter()
            .filter(|e| include_extract(e))
            .map(SnapshotExtract::from)
            .collect(),
        ..Snapshot::new()
    }
}
