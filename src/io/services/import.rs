//! Snapshot import service.
//!
//! Previews a snapshot against the live store and executes an import under
//! a set of conflict resolutions. Entities are written in dependency order
//! (themes, then groups, then extracts) so nothing references an entity
//! that has not been written yet.

use crate::io::codec;
use crate::io::conflicts::{self, Conflict, NameIndex};
use crate::io::plan::{self, Outcome, RemappingPlan, ResolutionEntry, Resolutions};
use crate::io::snapshot::{Snapshot, SnapshotExtract, SnapshotTheme, SnapshotThemeGroup};
use crate::models::{EntityKind, ExtractId, NewExtract, NewTheme, NewThemeGroup, ThemeGroupId, ThemeId};
use crate::storage::ContentStore;
use crate::Result;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use std::time::Instant;
use tracing::instrument;

/// Counts shown in a preview.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewSummary {
    /// Themes in the snapshot.
    pub total_themes: usize,
    /// Groups in the snapshot.
    pub total_theme_groups: usize,
    /// Extracts in the snapshot.
    pub total_extracts: usize,
    /// Detected conflicts.
    pub conflicts_count: usize,
}

/// What an import would do, computed without writing anything.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    /// Snapshot themes.
    pub themes: Vec<SnapshotTheme>,
    /// Snapshot groups.
    pub theme_groups: Vec<SnapshotThemeGroup>,
    /// Snapshot extracts.
    pub extracts: Vec<SnapshotExtract>,
    /// Name conflicts with the live store.
    pub conflicts: Vec<Conflict>,
    /// Summary counts.
    pub summary: PreviewSummary,
    /// Validation warnings.
    pub warnings: Vec<String>,
}

/// A per-item import failure.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportError {
    /// Kind of the failed item.
    pub entity: EntityKind,
    /// Original ID of the failed item.
    pub original_id: String,
    /// What went wrong.
    pub message: String,
}

impl ImportError {
    fn new(entity: EntityKind, original_id: &str, message: impl Into<String>) -> Self {
        Self {
            entity,
            original_id: original_id.to_string(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ImportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} '{}': {}", self.entity, self.original_id, self.message)
    }
}

/// Result of an import operation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportResult {
    /// Themes written.
    pub created_themes: usize,
    /// Groups written.
    pub created_theme_groups: usize,
    /// Extracts written.
    pub created_extracts: usize,
    /// Themes and groups resolved as skipped.
    pub skipped_items: usize,
    /// Per-item failures.
    pub errors: Vec<ImportError>,
}

impl ImportResult {
    /// Creates an empty result.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            created_themes: 0,
            created_theme_groups: 0,
            created_extracts: 0,
            skipped_items: 0,
            errors: Vec::new(),
        }
    }

    /// Total entities written.
    #[must_use]
    pub const fn total_created(&self) -> usize {
        self.created_themes + self.created_theme_groups + self.created_extracts
    }

    /// Returns whether any items failed.
    #[must_use]
    pub const fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

/// Progress callback for import operations.
pub type ProgressCallback = Box<dyn Fn(&ImportProgress) + Send>;

/// Progress information during import.
#[derive(Debug, Clone, Default)]
pub struct ImportProgress {
    /// Items processed so far.
    pub processed: usize,
    /// Items in the snapshot.
    pub total: usize,
    /// Kind of the item just processed.
    pub current: Option<EntityKind>,
}

/// Runtime fate of a snapshot theme or group during execution.
#[derive(Debug, Clone)]
enum Written<I> {
    Live(I),
    Skipped,
    Failed,
}

/// Service for previewing and importing snapshots.
pub struct ImportService {
    store: Arc<dyn ContentStore>,
}

impl ImportService {
    /// Creates a new import service.
    #[must_use]
    pub fn new(store: Arc<dyn ContentStore>) -> Self {
        Self { store }
    }

    /// Decodes a snapshot and reports its conflicts with the live store.
    ///
    /// # Errors
    ///
    /// Returns a structural error if the snapshot cannot be decoded.
    #[instrument(skip(self, data), fields(operation = "preview_import", bytes = data.len()))]
    pub fn preview_import(&self, data: &[u8]) -> Result<ImportPreview> {
        let decoded = codec::decode_with_warnings(data)?;
        let index = NameIndex::load(self.store.as_ref())?;
        let found = conflicts::detect(&decoded.snapshot, &index);
        let snapshot = decoded.snapshot;

        tracing::info!(
            themes = snapshot.themes.len(),
            theme_groups = snapshot.theme_groups.len(),
            extracts = snapshot.extracts.len(),
            conflicts = found.len(),
            warnings = decoded.warnings.len(),
            "Import preview ready"
        );

        Ok(ImportPreview {
            summary: PreviewSummary {
                total_themes: snapshot.themes.len(),
                total_theme_groups: snapshot.theme_groups.len(),
                total_extracts: snapshot.extracts.len(),
                conflicts_count: found.len(),
            },
            themes: snapshot.themes,
            theme_groups: snapshot.theme_groups,
            extracts: snapshot.extracts,
            conflicts: found,
            warnings: decoded.warnings.iter().map(ToString::to_string).collect(),
        })
    }

    /// Imports a snapshot under the given resolutions.
    ///
    /// Conflicts are detected again against the live store, so a name taken
    /// after the preview still needs a decision.
    ///
    /// # Errors
    ///
    /// Fails without writing anything if the snapshot is structurally
    /// invalid or a conflict has no resolution. Per-item write failures are
    /// reported in [`ImportResult::errors`] instead.
    pub fn execute_import(
        &self,
        data: &[u8],
        resolutions: &[ResolutionEntry],
    ) -> Result<ImportResult> {
        self.execute_import_with_progress(data, resolutions, None)
    }

    /// Like [`Self::execute_import`], reporting progress after every item.
    #[instrument(
        skip(self, data, resolutions, progress),
        fields(operation = "execute_import", bytes = data.len(), resolutions = resolutions.len())
    )]
    pub fn execute_import_with_progress(
        &self,
        data: &[u8],
        resolutions: &[ResolutionEntry],
        progress: Option<ProgressCallback>,
    ) -> Result<ImportResult> {
        let snapshot = codec::decode(data)?;
        let resolutions = Resolutions::from_entries(resolutions)?;
        let index = NameIndex::load(self.store.as_ref())?;
        let found = conflicts::detect(&snapshot, &index);
        let plan = plan::build_plan(&snapshot, &found, &resolutions)?;

        Ok(self.execute(&snapshot, &plan, progress))
    }

    /// Writes a snapshot according to a plan.
    ///
    /// Never fails as a whole: each item that cannot be written is recorded
    /// and anything that depends on it is not written either.
    pub fn execute(
        &self,
        snapshot: &Snapshot,
        plan: &RemappingPlan,
        progress: Option<ProgressCallback>,
    ) -> ImportResult {
        let start = Instant::now();
        let mut run = Run {
            store: self.store.as_ref(),
            result: ImportResult::new(),
            themes: HashMap::with_capacity(snapshot.themes.len()),
            progress: ImportProgress {
                total: snapshot.themes.len() + snapshot.theme_groups.len() + snapshot.extracts.len(),
                ..Default::default()
            },
            callback: progress,
        };

        for theme in &snapshot.themes {
            run.theme(theme, plan.theme(&theme.original_id));
        }
        for group in &snapshot.theme_groups {
            run.theme_group(group, plan.theme_group(&group.original_id));
        }
        for extract in &snapshot.extracts {
            run.extract(extract);
        }

        let result = run.result;
        tracing::info!(
            created_themes = result.created_themes,
            created_theme_groups = result.created_theme_groups,
            created_extracts = result.created_extracts,
            skipped = result.skipped_items,
            errors = result.errors.len(),
            duration_ms = start.elapsed().as_millis(),
            "Import finished"
        );
        result
    }
}

/// Mutable state of one execution.
struct Run<'a> {
    store: &'a dyn ContentStore,
    result: ImportResult,
    themes: HashMap<&'a str, Written<ThemeId>>,
    progress: ImportProgress,
    callback: Option<ProgressCallback>,
}

impl<'a> Run<'a> {
    fn tick(&mut self, kind: EntityKind, outcome: &'static str) {
        metrics::counter!(
            "import_items_total",
            "entity" => kind.as_str(),
            "outcome" => outcome
        )
        .increment(1);
        self.progress.processed += 1;
        self.progress.current = Some(kind);
        if let Some(cb) = &self.callback {
            cb(&self.progress);
        }
    }

    fn fail(&mut self, kind: EntityKind, original_id: &str, message: impl Into<String>) {
        let error = ImportError::new(kind, original_id, message);
        tracing::warn!(entity = %kind, original_id, error = %error.message, "Import item failed");
        self.result.errors.push(error);
        self.tick(kind, "error");
    }

    fn skip(&mut self, kind: EntityKind, original_id: &str) {
        tracing::debug!(entity = %kind, original_id, "Skipping item");
        self.result.skipped_items += 1;
        self.tick(kind, "skipped");
    }

    fn theme(&mut self, theme: &'a SnapshotTheme, outcome: Option<&Outcome<ThemeId>>) {
        let key = theme.original_id.as_str();
        let written = match outcome {
            None => {
                self.fail(EntityKind::Theme, key, "no plan entry for theme");
                Written::Failed
            },
            Some(Outcome::Skip) => {
                self.skip(EntityKind::Theme, key);
                Written::Skipped
            },
            Some(Outcome::Reuse { id }) => match self.store.theme_exists(id) {
                Ok(true) => {
                    self.tick(EntityKind::Theme, "reused");
                    Written::Live(id.clone())
                },
                Ok(false) => {
                    self.fail(
                        EntityKind::Theme,
                        key,
                        format!("existing theme '{id}' no longer exists"),
                    );
                    Written::Failed
                },
                Err(e) => {
                    self.fail(EntityKind::Theme, key, e.to_string());
                    Written::Failed
                },
            },
            Some(Outcome::Create { id, name }) => {
                let request = NewTheme {
                    id: id.clone(),
                    name: name.clone(),
                    description: theme.description.clone(),
                    color: theme.color.clone(),
                };
                match self.store.create_theme(&request) {
                    Ok(created) => {
                        self.result.created_themes += 1;
                        self.tick(EntityKind::Theme, "created");
                        Written::Live(created.id)
                    },
                    Err(e) => {
                        self.fail(EntityKind::Theme, key, e.to_string());
                        Written::Failed
                    },
                }
            },
        };
        self.themes.insert(key, written);
    }

    fn theme_group(&mut self, group: &SnapshotThemeGroup, outcome: Option<&Outcome<ThemeGroupId>>) {
        let key = group.original_id.as_str();
        match outcome {
            None => self.fail(EntityKind::ThemeGroup, key, "no plan entry for theme group"),
            Some(Outcome::Skip) => self.skip(EntityKind::ThemeGroup, key),
            Some(Outcome::Reuse { id }) => match self.store.theme_group_exists(id) {
                Ok(true) => self.tick(EntityKind::ThemeGroup, "reused"),
                Ok(false) => self.fail(
                    EntityKind::ThemeGroup,
                    key,
                    format!("existing theme group '{id}' no longer exists"),
                ),
                Err(e) => self.fail(EntityKind::ThemeGroup, key, e.to_string()),
            },
            Some(Outcome::Create { id, name }) => {
                let mut members: Vec<ThemeId> = Vec::with_capacity(group.theme_original_ids.len());
                for member in &group.theme_original_ids {
                    match self.themes.get(member.as_str()) {
                        Some(Written::Live(theme_id)) => {
                            if !members.contains(theme_id) {
                                members.push(theme_id.clone());
                            }
                        },
                        Some(Written::Skipped) => {
                            tracing::debug!(group = key, theme = %member, "Dropping skipped member");
                        },
                        Some(Written::Failed) | None => {
                            self.fail(
                                EntityKind::ThemeGroup,
                                key,
                                format!("member theme '{member}' was not imported"),
                            );
                            return;
                        },
                    }
                }

                let request = NewThemeGroup {
                    id: id.clone(),
                    name: name.clone(),
                    description: group.description.clone(),
                    color: group.color.clone(),
                    theme_ids: members,
                };
                match self.store.create_theme_group(&request) {
                    Ok(_) => {
                        self.result.created_theme_groups += 1;
                        self.tick(EntityKind::ThemeGroup, "created");
                    },
                    Err(e) => self.fail(EntityKind::ThemeGroup, key, e.to_string()),
                }
            },
        }
    }

    fn extract(&mut self, extract: &SnapshotExtract) {
        let key = extract.original_id.as_str();
        let theme_id = match extract.theme_original_id.as_deref() {
            None => None,
            Some(theme) => match self.themes.get(theme) {
                Some(Written::Live(id)) => Some(id.clone()),
                Some(Written::Skipped) => {
                    tracing::debug!(extract = key, theme, "Theme was skipped, importing unthemed");
                    None
                },
                Some(Written::Failed) | None => {
                    self.fail(
                        EntityKind::Extract,
                        key,
                        format!("theme '{theme}' was not imported"),
                    );
                    return;
                },
            },
        };

        let request = NewExtract {
            id: ExtractId::generate(),
            text: extract.text.clone(),
            anime_id: extract.anime_id,
            anime_title: extract.anime_title.clone(),
            anime_image: extract.anime_image.clone(),
            timing: extract.timing.clone(),
            episode: extract.episode,
            season: extract.season,
            characters: extract.characters.clone(),
            theme_id,
        };
        match self.store.create_extract(&request) {
            Ok(_) => {
                self.result.created_extracts += 1;
                self.tick(EntityKind::Extract, "created");
            },
            Err(e) => self.fail(EntityKind::Extract, key, e.to_string()),
        }
    }
}
