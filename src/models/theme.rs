//! Themes and theme groups.

use super::{ThemeGroupId, ThemeId};

/// A live theme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Theme {
    /// Unique identifier.
    pub id: ThemeId,
    /// Name, unique among themes (case-sensitive).
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Display color. Opaque to the engine.
    pub color: String,
    /// Number of extracts referencing this theme (derived at read time).
    pub extract_count: usize,
}

/// A live theme group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThemeGroup {
    /// Unique identifier.
    pub id: ThemeGroupId,
    /// Name, unique among theme groups (case-sensitive).
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Display color. Opaque to the engine.
    pub color: String,
    /// Member themes, in membership order.
    pub theme_ids: Vec<ThemeId>,
    /// Sum of the member themes' extract counts (derived at read time).
    pub extract_count: usize,
}

impl ThemeGroup {
    /// Returns whether the group lists the given theme as a member.
    #[must_use]
    pub fn contains(&self, theme_id: &ThemeId) -> bool {
        self.theme_ids.contains(theme_id)
    }
}

/// Request to create a theme with a caller-assigned ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTheme {
    /// ID the new theme will receive.
    pub id: ThemeId,
    /// Theme name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Display color.
    pub color: String,
}

impl NewTheme {
    /// Creates a request with a freshly generated ID.
    #[must_use]
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: ThemeId::generate(),
            name: name.into(),
            description: None,
            color: color.into(),
        }
    }

    /// Sets the ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ThemeId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Request to create a theme group with a caller-assigned ID.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewThemeGroup {
    /// ID the new group will receive.
    pub id: ThemeGroupId,
    /// Group name.
    pub name: String,
    /// Optional description.
    pub description: Option<String>,
    /// Display color.
    pub color: String,
    /// Member themes. Every one must already be live.
    pub theme_ids: Vec<ThemeId>,
}

impl NewThemeGroup {
    /// Creates a request with a freshly generated ID and no members.
    #[must_use]
    pub fn new(name: impl Into<String>, color: impl Into<String>) -> Self {
        Self {
            id: ThemeGroupId::generate(),
            name: name.into(),
            description: None,
            color: color.into(),
            theme_ids: Vec::new(),
        }
    }

    /// Sets the ID.
    #[must_use]
    pub fn with_id(mut self, id: impl Into<ThemeGroupId>) -> Self {
        self.id = id.into();
        self
    }

    /// Sets the description.
    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Adds a member theme.
    #[must_use]
    pub fn with_theme(mut self, theme_id: impl Into<ThemeId>) -> Self {
        self.theme_ids.push(theme_id.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_theme_builder() {
        let theme = NewTheme::new("Courage", "#ff0000")
            .with_id("t1")
            .with_description("Standing up");
        assert_eq!(theme.id.as_str(), "t1");
        assert_eq!(theme.name, "Courage");
        assert_eq!(theme.description.as_deref(), Some("Standing up"));
    }

    #[test]
    fn test_new_group_builder() {
        let group = NewThemeGroup::new("Virtues", "#00ff00")
            .with_theme("t1")
            .with_theme("t2");
        assert_eq!(group.theme_ids, vec![ThemeId::new("t1"), ThemeId::new("t2")]);
        assert!(group.description.is_none());
    }
}
