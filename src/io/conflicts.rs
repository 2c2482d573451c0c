//! Name conflict detection.
//!
//! A conflict is an exact, case-sensitive name match between a snapshot
//! theme or group and a live entity of the same kind. Detection is a pure
//! function of the snapshot and a [`NameIndex`] snapshot of the store.

use crate::io::snapshot::{Snapshot, SnapshotTheme, SnapshotThemeGroup};
use crate::models::{Theme, ThemeGroup};
use crate::storage::ContentStore;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// The kind of name collision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConflictType {
    /// A theme with the same name already exists.
    ThemeNameExists,
    /// A theme group with the same name already exists.
    ThemeGroupNameExists,
}

impl ConflictType {
    /// Returns the wire representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::ThemeNameExists => "THEME_NAME_EXISTS",
            Self::ThemeGroupNameExists => "THEME_GROUP_NAME_EXISTS",
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConflictType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "THEME_NAME_EXISTS" | "THEME" => Ok(Self::ThemeNameExists),
            "THEME_GROUP_NAME_EXISTS" | "THEME_GROUP" | "GROUP" => Ok(Self::ThemeGroupNameExists),
            _ => Err(Error::InvalidInput(format!("Unknown conflict type: {s}"))),
        }
    }
}

/// One side of a conflict.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictItem {
    /// Original ID for the imported side, live ID for the existing side.
    pub id: String,
    /// Entity name.
    pub name: String,
    /// Optional description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Display color.
    pub color: String,
    /// Extracts attached (directly for themes, through members for groups).
    pub extract_count: usize,
}

/// A name collision between a snapshot item and a live entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    /// Conflict kind.
    #[serde(rename = "type")]
    pub conflict_type: ConflictType,
    /// The snapshot item.
    pub imported_item: ConflictItem,
    /// The live entity it collides with.
    pub existing_item: ConflictItem,
}

impl Conflict {
    /// Original ID of the imported item.
    #[must_use]
    pub fn original_id(&self) -> &str {
        &self.imported_item.id
    }

    /// Live ID of the existing entity.
    #[must_use]
    pub fn existing_id(&self) -> &str {
        &self.existing_item.id
    }
}

/// Live theme and group names, as read from the store at one point in time.
#[derive(Debug, Clone, Default)]
pub struct NameIndex {
    themes: HashMap<String, Theme>,
    theme_groups: HashMap<String, ThemeGroup>,
}

impl NameIndex {
    /// Builds an index from entity lists.
    #[must_use]
    pub fn from_parts(themes: Vec<Theme>, theme_groups: Vec<ThemeGroup>) -> Self {
        Self {
            themes: themes.into_iter().map(|t| (t.name.clone(), t)).collect(),
            theme_groups: theme_groups
                .into_iter()
                .map(|g| (g.name.clone(), g))
                .collect(),
        }
    }

    /// Reads the current themes and groups from a store.
    pub fn load(store: &dyn ContentStore) -> Result<Self> {
        Ok(Self::from_parts(
            store.list_themes()?,
            store.list_theme_groups()?,
        ))
    }

    /// Looks up a live theme by exact name.
    #[must_use]
    pub fn theme(&self, name: &str) -> Option<&Theme> {
        self.themes.get(name)
    }

    /// Looks up a live group by exact name.
    #[must_use]
    pub fn theme_group(&self, name: &str) -> Option<&ThemeGroup> {
        self.theme_groups.get(name)
    }
}

/// Finds every snapshot theme and group whose name is already taken.
///
/// Theme conflicts come first, then group conflicts, each in snapshot order.
/// Extracts never conflict.
#[must_use]
pub fn detect(snapshot: &Snapshot, index: &NameIndex) -> Vec<Conflict> {
    let themes = snapshot.themes.iter().filter_map(|theme| {
        index.theme(&theme.name).map(|existing| Conflict {
            conflict_type: ConflictType::ThemeNameExists,
            imported_item: imported_theme(snapshot, theme),
            existing_item: ConflictItem {
                id: existing.id.to_string(),
                name: existing.name.clone(),
                description: existing.description.clone(),
                color: existing.color.clone(),
                extract_count: existing.extract_count,
            },
        })
    });

    let groups = snapshot.theme_groups.iter().filter_map(|group| {
        index.theme_group(&group.name).map(|existing| Conflict {
            conflict_type: ConflictType::ThemeGroupNameExists,
            imported_item: imported_group(snapshot, group),
            existing_item: ConflictItem {
                id: existing.id.to_string(),
                name: existing.name.clone(),
                description: existing.description.clone(),
                color: existing.color.clone(),
                extract_count: existing.extract_count,
            },
        })
    });

    themes.chain(groups).collect()
}

fn imported_theme(snapshot: &Snapshot, theme: &SnapshotTheme) -> ConflictItem {
    ConflictItem {
        id: theme.original_id.clone(),
        name: theme.name.clone(),
        description: theme.description.clone(),
        color: theme.color.clone(),
        extract_count: snapshot.extracts_referencing(&theme.original_id),
    }
}

fn imported_group(snapshot: &Snapshot, group: &SnapshotThemeGroup) -> ConflictItem {
    ConflictItem {
        id: group.original_id.clone(),
        name: group.name.clone(),
        description: group.description.clone(),
        color: group.color.clone(),
        extract_count: group
            .theme_original_ids
            .iter()
            .map(|id| snapshot.extracts_referencing(id))
            .sum(),
    }
}
