//! Snapshot wire types.
//!
//! A snapshot is self-contained: every reference inside it uses the
//! `originalId` of an entity that is also inside it.

use crate::models::{Extract, Theme, ThemeGroup, Timing};
use crate::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Format version written by this build.
pub const FORMAT_VERSION: &str = "1.0";

/// Format versions this build can decode.
pub const SUPPORTED_VERSIONS: &[&str] = &[FORMAT_VERSION];

/// Selection mode an export was produced from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExportKind {
    /// Selected themes and their extracts.
    Themes,
    /// Selected groups, their member themes, and those themes' extracts.
    ThemeGroups,
    /// Selected extracts and their themes.
    Extracts,
    /// The whole store.
    All,
}

impl ExportKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Themes => "themes",
            Self::ThemeGroups => "theme-groups",
            Self::Extracts => "extracts",
            Self::All => "all",
        }
    }
}

impl fmt::Display for ExportKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ExportKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "themes" | "theme" => Ok(Self::Themes),
            "theme-groups" | "themegroups" | "theme_groups" | "groups" => Ok(Self::ThemeGroups),
            "extracts" | "extract" => Ok(Self::Extracts),
            "all" => Ok(Self::All),
            _ => Err(Error::InvalidInput(format!("Unknown export kind: {s}"))),
        }
    }
}

/// A portable, versioned serialization of part of the content graph.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Format version of this snapshot.
    pub format_version: String,
    /// Exported themes.
    pub themes: Vec<SnapshotTheme>,
    /// Exported theme groups.
    pub theme_groups: Vec<SnapshotThemeGroup>,
    /// Exported extracts.
    pub extracts: Vec<SnapshotExtract>,
    /// Export metadata.
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

impl Snapshot {
    /// Creates an empty snapshot at the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            themes: Vec::new(),
            theme_groups: Vec::new(),
            extracts: Vec::new(),
            metadata: SnapshotMetadata::default(),
        }
    }

    /// Recomputes the metadata totals from the entity lists.
    pub fn refresh_totals(&mut self) {
        self.metadata.total_themes = self.themes.len();
        self.metadata.total_theme_groups = self.theme_groups.len();
        self.metadata.total_extracts = self.extracts.len();
    }

    /// Counts the extracts in this snapshot that reference a theme.
    #[must_use]
    pub fn extracts_referencing(&self, theme_original_id: &str) -> usize {
        self.extracts
            .iter()
            .filter(|e| e.theme_original_id.as_deref() == Some(theme_original_id))
            .count()
    }
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new()
    }
}

/// Summary metadata carried by every snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Selection mode the snapshot was produced from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_type: Option<ExportKind>,
    /// When the snapshot was produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exported_at: Option<DateTime<Utc>>,
    /// Number of themes.
    #[serde(default)]
    pub total_themes: usize,
    /// Number of theme groups.
    #[serde(default)]
    pub total_theme_groups: usize,
    /// Number of extracts.
    #[serde(default)]
    pub total_extracts: usize,
}

/// A theme as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotTheme {
    /// ID in the exporting store.
    pub original_id: String,
    /// Theme name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Display color.
    pub color: String,
}

impl From<&Theme> for SnapshotTheme {
    fn from(t: &Theme) -> Self {
        Self {
            original_id: t.id.to_string(),
            name: t.name.clone(),
            description: t.description.clone(),
            color: t.color.clone(),
        }
    }
}

/// A theme group as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotThemeGroup {
    /// ID in the exporting store.
    pub original_id: String,
    /// Group name.
    pub name: String,
    /// Optional description.
    #[serde(default)]
    pub description: Option<String>,
    /// Display color.
    pub color: String,
    /// Original IDs of the member themes.
    #[serde(default)]
    pub theme_original_ids: Vec<String>,
}

impl From<&ThemeGroup> for SnapshotThemeGroup {
    fn from(g: &ThemeGroup) -> Self {
        Self {
            original_id: g.id.to_string(),
            name: g.name.clone(),
            description: g.description.clone(),
            color: g.color.clone(),
            theme_original_ids: g.theme_ids.iter().map(ToString::to_string).collect(),
        }
    }
}

/// An extract as recorded in a snapshot.
///
/// `isUsedInVideo` is not part of the format; it stays local to the
/// exporting store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotExtract {
    /// ID in the exporting store.
    pub original_id: String,
    /// Extract text.
    pub text: String,
    /// Anime reference ID.
    pub anime_id: i64,
    /// Anime title.
    pub anime_title: String,
    /// Anime cover image URL.
    #[serde(default)]
    pub anime_image: Option<String>,
    /// Interval inside the episode.
    pub timing: Timing,
    /// Episode number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub episode: Option<u32>,
    /// Season number.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub season: Option<u32>,
    /// Character records, passed through verbatim.
    #[serde(default)]
    pub characters: Vec<serde_json::Value>,
    /// Original ID of the extract's theme.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme_original_id: Option<String>,
}

impl From<&Extract> for SnapshotExtract {
    fn from(e: &Extract) -> Self {
        Self {
            original_id: e.id.to_string(),
            text: e.text.clone(),
            anime_id: e.anime_id,
            anime_title: e.anime_title.clone(),
            anime_image: e.anime_image.clone(),
            timing: e.timing.clone(),
            episode: e.episode,
            season: e.season,
            characters: e.characters.clone(),
            theme_original_id: e.theme_id.as_ref().map(ToString::to_string),
        }
    }
}
