//! Content store trait.

use crate::Result;
use crate::models::{
    Extract, NewExtract, NewTheme, NewThemeGroup, Theme, ThemeGroup, ThemeGroupId, ThemeId,
};

/// Everything in the store, read at one point in time.
#[derive(Debug, Clone, Default)]
pub struct StoreContents {
    /// All themes, in creation order.
    pub themes: Vec<Theme>,
    /// All theme groups, in creation order.
    pub theme_groups: Vec<ThemeGroup>,
    /// All extracts, in creation order.
    pub extracts: Vec<Extract>,
}

/// Trait for content store backends.
///
/// The store is the single enforcement point for the graph's invariants:
///
/// - Theme names are unique among themes, group names among groups. A
///   create that would break this fails with [`crate::Error::NameConflict`].
/// - Every reference a create request carries (an extract's theme, a group's
///   member themes) must resolve to a live theme, or the create fails with
///   [`crate::Error::NotFound`].
///
/// Both checks happen atomically with the insert, so callers holding stale
/// name information still cannot produce duplicates or dangling references.
pub trait ContentStore: Send + Sync {
    /// Creates a theme.
    fn create_theme(&self, theme: &NewTheme) -> Result<Theme>;

    /// Creates a theme group and its memberships.
    fn create_theme_group(&self, group: &NewThemeGroup) -> Result<ThemeGroup>;

    /// Creates an extract.
    fn create_extract(&self, extract: &NewExtract) -> Result<Extract>;

    /// Retrieves a theme by ID.
    fn get_theme(&self, id: &ThemeId) -> Result<Option<Theme>>;

    /// Retrieves a theme group by ID.
    fn get_theme_group(&self, id: &ThemeGroupId) -> Result<Option<ThemeGroup>>;

    /// Lists all themes in creation order.
    fn list_themes(&self) -> Result<Vec<Theme>>;

    /// Lists all theme groups in creation order.
    fn list_theme_groups(&self) -> Result<Vec<ThemeGroup>>;

    /// Lists all extracts in creation order.
    fn list_extracts(&self) -> Result<Vec<Extract>>;

    /// Reads all three lists.
    ///
    /// Backends override this to take the three reads from one consistent
    /// view of the store.
    fn load_contents(&self) -> Result<StoreContents> {
        Ok(StoreContents {
            themes: self.list_themes()?,
            theme_groups: self.list_theme_groups()?,
            extracts: self.list_extracts()?,
        })
    }

    /// Checks if a theme exists.
    fn theme_exists(&self, id: &ThemeId) -> Result<bool> {
        Ok(self.get_theme(id)?.is_some())
    }

    /// Checks if a theme group exists.
    fn theme_group_exists(&self, id: &ThemeGroupId) -> Result<bool> {
        Ok(self.get_theme_group(id)?.is_some())
    }
}
