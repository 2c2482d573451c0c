//! Data models for themeport.
//!
//! Live entities as the store hands them out, and the creation requests the
//! import executor sends to the store.

mod extract;
mod ids;
mod theme;

pub use extract::{Extract, NewExtract, Timing};
pub use ids::{ExtractId, ThemeGroupId, ThemeId};
pub use theme::{NewTheme, NewThemeGroup, Theme, ThemeGroup};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The three kinds of entity in the content graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EntityKind {
    /// A theme.
    Theme,
    /// A theme group.
    ThemeGroup,
    /// An extract.
    Extract,
}

impl EntityKind {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Theme => "theme",
            Self::ThemeGroup => "theme group",
            Self::Extract => "extract",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
