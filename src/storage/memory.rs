//! In-process content store.
//!
//! Keeps every entity in insertion-ordered vectors behind a single `RwLock`.
//! Uniqueness and reference checks run under the write lock together with
//! the insert, which gives the same atomicity the `SQLite` constraints give.

use crate::models::{
    EntityKind, Extract, NewExtract, NewTheme, NewThemeGroup, Theme, ThemeGroup, ThemeGroupId,
    ThemeId,
};
use crate::storage::traits::{ContentStore, StoreContents};
use crate::{Error, Result};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::instrument;

#[derive(Debug, Default)]
struct Inner {
    themes: Vec<NewTheme>,
    groups: Vec<NewThemeGroup>,
    extracts: Vec<Extract>,
}

impl Inner {
    fn has_theme(&self, id: &ThemeId) -> bool {
        self.themes.iter().any(|t| &t.id == id)
    }

    fn extract_counts(&self) -> HashMap<&ThemeId, usize> {
        let mut counts = HashMap::new();
        for theme_id in self.extracts.iter().filter_map(|e| e.theme_id.as_ref()) {
            *counts.entry(theme_id).or_insert(0) += 1;
        }
        counts
    }

    fn theme_view(theme: &NewTheme, counts: &HashMap<&ThemeId, usize>) -> Theme {
        Theme {
            id: theme.id.clone(),
            name: theme.name.clone(),
            description: theme.description.clone(),
            color: theme.color.clone(),
            extract_count: counts.get(&theme.id).copied().unwrap_or(0),
        }
    }

    fn group_view(group: &NewThemeGroup, counts: &HashMap<&ThemeId, usize>) -> ThemeGroup {
        ThemeGroup {
            id: group.id.clone(),
            name: group.name.clone(),
            description: group.description.clone(),
            color: group.color.clone(),
            theme_ids: group.theme_ids.clone(),
            extract_count: group
                .theme_ids
                .iter()
                .map(|id| counts.get(id).copied().unwrap_or(0))
                .sum(),
        }
    }

    fn themes(&self) -> Vec<Theme> {
        let counts = self.extract_counts();
        self.themes
            .iter()
            .map(|t| Self::theme_view(t, &counts))
            .collect()
    }

    fn groups(&self) -> Vec<ThemeGroup> {
        let counts = self.extract_counts();
        self.groups
            .iter()
            .map(|g| Self::group_view(g, &counts))
            .collect()
    }
}

/// In-memory [`ContentStore`].
#[derive(Debug, Default)]
pub struct MemoryContentStore {
    inner: RwLock<Inner>,
}

impl MemoryContentStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Inner> {
        match self.inner.read() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("memory store lock was poisoned, recovering");
                poisoned.into_inner()
            },
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, Inner> {
        match self.inner.write() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("memory store lock was poisoned, recovering");
                poisoned.into_inner()
            },
        }
    }
}

impl ContentStore for MemoryContentStore {
    #[instrument(skip(self, theme), fields(operation = "create_theme", backend = "memory", theme.id = %theme.id))]
    fn create_theme(&self, theme: &NewTheme) -> Result<Theme> {
        let mut inner = self.write();
        if inner.themes.iter().any(|t| t.name == theme.name) {
            return Err(Error::NameConflict {
                kind: EntityKind::Theme,
                name: theme.name.clone(),
            });
        }
        if inner.has_theme(&theme.id) {
            return Err(Error::OperationFailed {
                operation: "create_theme".to_string(),
                cause: format!("duplicate theme id '{}'", theme.id),
            });
        }
        inner.themes.push(theme.clone());
        Ok(Inner::theme_view(theme, &HashMap::new()))
    }

    #[instrument(skip(self, group), fields(operation = "create_theme_group", backend = "memory", group.id = %group.id))]
    fn create_theme_group(&self, group: &NewThemeGroup) -> Result<ThemeGroup> {
        let mut inner = self.write();
        if inner.groups.iter().any(|g| g.name == group.name) {
            return Err(Error::NameConflict {
                kind: EntityKind::ThemeGroup,
                name: group.name.clone(),
            });
        }
        if inner.groups.iter().any(|g| g.id == group.id) {
            return Err(Error::OperationFailed {
                operation: "create_theme_group".to_string(),
                cause: format!("duplicate theme group id '{}'", group.id),
            });
        }
        if let Some(missing) = group.theme_ids.iter().find(|id| !inner.has_theme(id)) {
            return Err(Error::NotFound {
                kind: EntityKind::Theme,
                id: missing.to_string(),
            });
        }
        inner.groups.push(group.clone());
        let counts = inner.extract_counts();
        Ok(Inner::group_view(group, &counts))
    }

    #[instrument(skip(self, extract), fields(operation = "create_extract", backend = "memory", extract.id = %extract.id))]
    fn create_extract(&self, extract: &NewExtract) -> Result<Extract> {
        let mut inner = self.write();
        if let Some(theme_id) = &extract.theme_id {
            if !inner.has_theme(theme_id) {
                return Err(Error::NotFound {
                    kind: EntityKind::Theme,
                    id: theme_id.to_string(),
                });
            }
        }
        if inner.extracts.iter().any(|e| e.id == extract.id) {
            return Err(Error::OperationFailed {
                operation: "create_extract".to_string(),
                cause: format!("duplicate extract id '{}'", extract.id),
            });
        }
        let created = extract.clone().into_extract();
        inner.extracts.push(created.clone());
        Ok(created)
    }

    fn get_theme(&self, id: &ThemeId) -> Result<Option<Theme>> {
        Ok(self.read().themes().into_iter().find(|t| &t.id == id))
    }

    fn get_theme_group(&self, id: &ThemeGroupId) -> Result<Option<ThemeGroup>> {
        Ok(self.read().groups().into_iter().find(|g| &g.id == id))
    }

    fn list_themes(&self) -> Result<Vec<Theme>> {
        Ok(self.read().themes())
    }

    fn list_theme_groups(&self) -> Result<Vec<ThemeGroup>> {
        Ok(self.read().groups())
    }

    fn list_extracts(&self) -> Result<Vec<Extract>> {
        Ok(self.read().extracts.clone())
    }

    fn load_contents(&self) -> Result<StoreContents> {
        let inner = self.read();
        Ok(StoreContents {
            themes: inner.themes(),
            theme_groups: inner.groups(),
            extracts: inner.extracts.clone(),
        })
    }

    fn theme_exists(&self, id: &ThemeId) -> Result<bool> {
        Ok(self.read().has_theme(id))
    }

    fn theme_group_exists(&self, id: &ThemeGroupId) -> Result<bool> {
        Ok(self.read().groups.iter().any(|g| &g.id == id))
    }
}
