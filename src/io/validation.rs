//! Snapshot validation.
//!
//! Structural defects abort decoding with an error. Anything that can still
//! be imported safely is reported as a warning and surfaced in the preview.

use crate::io::snapshot::Snapshot;
use crate::models::EntityKind;
use crate::{Error, Result};
use std::collections::HashSet;
use std::fmt;

/// A non-fatal issue found in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationIssue {
    /// Kind of the entity with the issue.
    pub entity: EntityKind,
    /// Original ID of the entity with the issue.
    pub original_id: String,
    /// The field that has an issue.
    pub field: String,
    /// Description of the issue.
    pub message: String,
}

impl ValidationIssue {
    /// Creates a warning issue.
    #[must_use]
    pub fn warning(
        entity: EntityKind,
        original_id: impl Into<String>,
        field: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            entity,
            original_id: original_id.into(),
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.original_id.is_empty() {
            write!(f, "{}: {}", self.field, self.message)
        } else {
            write!(
                f,
                "{} '{}': {}: {}",
                self.entity, self.original_id, self.field, self.message
            )
        }
    }
}

/// Checks that a decoded snapshot is internally consistent.
///
/// # Errors (fatal)
///
/// - empty or repeated `originalId` within one entity kind
/// - empty theme or group name
/// - a group member or extract theme that is not in the snapshot
///
/// # Warnings
///
/// - two themes (or two groups) sharing a name
/// - a group listing the same theme more than once
/// - an extract with empty text
/// - metadata totals that disagree with the entity lists
#[derive(Debug, Default)]
pub struct SnapshotValidator;

impl SnapshotValidator {
    /// Creates a new validator.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Validates a snapshot, returning its warnings.
    pub fn validate(&self, snapshot: &Snapshot) -> Result<Vec<ValidationIssue>> {
        let mut warnings = Vec::new();

        let theme_ids = unique_ids(
            EntityKind::Theme,
            snapshot.themes.iter().map(|t| t.original_id.as_str()),
        )?;
        unique_ids(
            EntityKind::ThemeGroup,
            snapshot.theme_groups.iter().map(|g| g.original_id.as_str()),
        )?;
        unique_ids(
            EntityKind::Extract,
            snapshot.extracts.iter().map(|e| e.original_id.as_str()),
        )?;

        let mut theme_names = HashSet::new();
        for theme in &snapshot.themes {
            require_name(EntityKind::Theme, &theme.original_id, &theme.name)?;
            if !theme_names.insert(theme.name.as_str()) {
                warnings.push(ValidationIssue::warning(
                    EntityKind::Theme,
                    &theme.original_id,
                    "name",
                    format!("name '{}' appears more than once in this snapshot", theme.name),
                ));
            }
        }

        let mut group_names = HashSet::new();
        for group in &snapshot.theme_groups {
            require_name(EntityKind::ThemeGroup, &group.original_id, &group.name)?;
            if !group_names.insert(group.name.as_str()) {
                warnings.push(ValidationIssue::warning(
                    EntityKind::ThemeGroup,
                    &group.original_id,
                    "name",
                    format!("name '{}' appears more than once in this snapshot", group.name),
                ));
            }

            let mut members = HashSet::new();
            for member in &group.theme_original_ids {
                if !theme_ids.contains(member.as_str()) {
                    return Err(Error::DanglingReference {
                        entity: EntityKind::ThemeGroup,
                        original_id: group.original_id.clone(),
                        missing: member.clone(),
                    });
                }
                if !members.insert(member.as_str()) {
                    warnings.push(ValidationIssue::warning(
                        EntityKind::ThemeGroup,
                        &group.original_id,
                        "themeOriginalIds",
                        format!("theme '{member}' is listed more than once"),
                    ));
                }
            }
        }

        for extract in &snapshot.extracts {
            if let Some(theme) = &extract.theme_original_id {
                if !theme_ids.contains(theme.as_str()) {
                    return Err(Error::DanglingReference {
                        entity: EntityKind::Extract,
                        original_id: extract.original_id.clone(),
                        missing: theme.clone(),
                    });
                }
            }
            if extract.text.trim().is_empty() {
                warnings.push(ValidationIssue::warning(
                    EntityKind::Extract,
                    &extract.original_id,
                    "text",
                    "text is empty",
                ));
            }
        }

        warnings.extend(check_totals(snapshot));
        Ok(warnings)
    }
}

fn unique_ids<'a>(
    kind: EntityKind,
    ids: impl Iterator<Item = &'a str>,
) -> Result<HashSet<&'a str>> {
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err(Error::MalformedSnapshot(format!("{kind} with empty originalId")));
        }
        if !seen.insert(id) {
            return Err(Error::MalformedSnapshot(format!(
                "{kind} originalId '{id}' appears more than once"
            )));
        }
    }
    Ok(seen)
}

fn require_name(kind: EntityKind, original_id: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::MalformedSnapshot(format!(
            "{kind} '{original_id}' has an empty name"
        )));
    }
    Ok(())
}

fn check_totals(snapshot: &Snapshot) -> Vec<ValidationIssue> {
    let meta = &snapshot.metadata;
    [
        (EntityKind::Theme, "totalThemes", meta.total_themes, snapshot.themes.len()),
        (
            EntityKind::ThemeGroup,
            "totalThemeGroups",
            meta.total_theme_groups,
            snapshot.theme_groups.len(),
        ),
        (EntityKind::Extract, "totalExtracts", meta.total_extracts, snapshot.extracts.len()),
    ]
    .into_iter()
    .filter(|(_, _, declared, actual)| declared != actual)
    .map(|(kind, field, declared, actual)| {
        ValidationIssue::warning(
            kind,
            "",
            format!("metadata.{field}"),
            format!("declares {declared} but snapshot contains {actual}"),
        )
    })
    .collect()
}
