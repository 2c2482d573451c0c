//! End-to-end export/import scenarios.
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::too_many_lines,
    clippy::redundant_closure_for_method_calls
)]

use std::collections::HashSet;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use themeport::io::{
    ConflictType, ExportService, ImportService, ImportSession, Resolution, ResolutionEntry,
    Selection, SessionState,
};
use themeport::models::{
    EntityKind, Extract, NewExtract, NewTheme, NewThemeGroup, Theme, ThemeGroup, ThemeGroupId,
    ThemeId,
};
use themeport::storage::{ContentStore, MemoryContentStore, SqliteContentStore};
use themeport::{Error, Result};

// ============================================================================
// Fixtures
// ============================================================================

/// Source store: theme `t1` "Courage" with two extracts, theme `t2` "Loss"
/// with one, and group `g1` "Virtues" holding both.
fn source_store() -> Arc<dyn ContentStore> {
    let store = SqliteContentStore::in_memory().unwrap();
    store
        .create_theme(&NewTheme::new("Courage", "#ff0000").with_id("t1"))
        .unwrap();
    store
        .create_theme(&NewTheme::new("Loss", "#0000ff").with_id("t2"))
        .unwrap();
    store
        .create_theme_group(
            &NewThemeGroup::new("Virtues", "#ffffff")
                .with_id("g1")
                .with_theme("t1")
                .with_theme("t2"),
        )
        .unwrap();
    for (id, text, theme) in [
        ("e1", "Believe it!", "t1"),
        ("e2", "I never go back on my word", "t1"),
        ("e3", "Thank you for loving me", "t2"),
    ] {
        store
            .create_extract(
                &NewExtract::new(text, 20, "Naruto")
                    .with_id(id)
                    .with_theme(theme)
                    .with_episode(1),
            )
            .unwrap();
    }
    Arc::new(store)
}

fn export(store: &Arc<dyn ContentStore>, selection: &Selection) -> Vec<u8> {
    ExportService::new(Arc::clone(store))
        .export_selection(selection)
        .unwrap()
        .data
}

/// Target store that already has a theme named "Courage".
fn target_with_courage() -> (Arc<MemoryContentStore>, ThemeId) {
    let store = Arc::new(MemoryContentStore::new());
    let existing = store
        .create_theme(&NewTheme::new("Courage", "#123456"))
        .unwrap();
    (store, existing.id)
}

fn assert_no_dangling(store: &dyn ContentStore) {
    let themes: HashSet<ThemeId> = store.list_themes().unwrap().into_iter().map(|t| t.id).collect();
    for extract in store.list_extracts().unwrap() {
        if let Some(theme) = &extract.theme_id {
            assert!(themes.contains(theme), "extract {} -> {theme}", extract.id);
        }
    }
    for group in store.list_theme_groups().unwrap() {
        for theme in &group.theme_ids {
            assert!(themes.contains(theme), "group {} -> {theme}", group.id);
        }
    }
}

fn assert_unique_names(store: &dyn ContentStore) {
    let themes = store.list_themes().unwrap();
    let names: HashSet<&str> = themes.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names.len(), themes.len(), "duplicate theme names");
    let groups = store.list_theme_groups().unwrap();
    let names: HashSet<&str> = groups.iter().map(|g| g.name.as_str()).collect();
    assert_eq!(names.len(), groups.len(), "duplicate group names");
}

// ============================================================================
// Conflict resolution scenarios
// ============================================================================

#[test]
fn test_export_single_theme_metadata() {
    let source = source_store();
    let bundle = ExportService::new(source)
        .export_selection(&Selection::Themes(vec![ThemeId::new("t1")]))
        .unwrap();

    assert_eq!(bundle.metadata.total_themes, 1);
    assert_eq!(bundle.metadata.total_theme_groups, 0);
    assert_eq!(bundle.metadata.total_extracts, 2);
    assert!(bundle.file_name.starts_with("themes-export-themes-"));
}

#[test]
fn test_reuse_existing_theme() {
    let data = export(&source_store(), &Selection::Themes(vec![ThemeId::new("t1")]));
    let (target, existing_id) = target_with_courage();
    let service = ImportService::new(target.clone());

    let preview = service.preview_import(&data).unwrap();
    assert_eq!(preview.conflicts.len(), 1);
    assert_eq!(preview.conflicts[0].conflict_type, ConflictType::ThemeNameExists);

    let resolutions = [ResolutionEntry::for_conflict(
        &preview.conflicts[0],
        Resolution::ReuseExisting,
    )];
    let result = service.execute_import(&data, &resolutions).unwrap();

    assert_eq!(result.created_themes, 0);
    assert_eq!(result.created_extracts, 2);
    assert!(result.errors.is_empty());
    let extracts = target.list_extracts().unwrap();
    assert!(extracts.iter().all(|e| e.theme_id.as_ref() == Some(&existing_id)));
    assert_eq!(target.list_themes().unwrap().len(), 1);
}

#[test]
fn test_create_duplicate_theme() {
    let data = export(&source_store(), &Selection::Themes(vec![ThemeId::new("t1")]));
    let (target, existing_id) = target_with_courage();
    let service = ImportService::new(target.clone());

    let resolutions = [ResolutionEntry::new(
        ConflictType::ThemeNameExists,
        "t1",
        Resolution::CreateDuplicate,
    )];
    let result = service.execute_import(&data, &resolutions).unwrap();

    assert_eq!(result.created_themes, 1);
    assert_eq!(result.created_extracts, 2);
    let copy = target
        .list_themes()
        .unwrap()
        .into_iter()
        .find(|t| t.name == "Courage (copie)")
        .unwrap();
    assert_ne!(copy.id, existing_id);
    assert_eq!(copy.extract_count, 2);
    assert_unique_names(target.as_ref());
}

#[test]
fn test_duplicate_name_already_taken_fails_per_item() {
    let data = export(&source_store(), &Selection::Themes(vec![ThemeId::new("t1")]));
    let (target, _) = target_with_courage();
    target
        .create_theme(&NewTheme::new("Courage (copie)", "#654321"))
        .unwrap();
    let service = ImportService::new(target.clone());

    let resolutions = [ResolutionEntry::new(
        ConflictType::ThemeNameExists,
        "t1",
        Resolution::CreateDuplicate,
    )];
    let result = service.execute_import(&data, &resolutions).unwrap();

    assert_eq!(result.created_themes, 0);
    assert_eq!(result.created_extracts, 0);
    assert_eq!(result.skipped_items, 0);
    let failed: Vec<(EntityKind, &str)> = result
        .errors
        .iter()
        .map(|e| (e.entity, e.original_id.as_str()))
        .collect();
    assert_eq!(
        failed,
        vec![
            (EntityKind::Theme, "t1"),
            (EntityKind::Extract, "e1"),
            (EntityKind::Extract, "e2"),
        ]
    );
    assert!(result.errors[0].message.contains("Courage (copie)"));
    assert_eq!(target.list_themes().unwrap().len(), 2);
    assert!(target.list_extracts().unwrap().is_empty());
    assert_unique_names(target.as_ref());
    assert_no_dangling(target.as_ref());
}

#[test]
fn test_skip_theme_keeps_extracts_unthemed() {
    let data = export(&source_store(), &Selection::Themes(vec![ThemeId::new("t1")]));
    let (target, _) = target_with_courage();
    let service = ImportService::new(target.clone());

    let resolutions = [ResolutionEntry::new(
        ConflictType::ThemeNameExists,
        "t1",
        Resolution::Skip,
    )];
    let result = service.execute_import(&data, &resolutions).unwrap();

    assert_eq!(result.created_themes, 0);
    assert_eq!(result.skipped_items, 1);
    assert_eq!(result.created_extracts, 2);
    assert!(target.list_extracts().unwrap().iter().all(|e| e.theme_id.is_none()));
}

#[test]
fn test_skip_is_soft_for_groups() {
    let data = export(
        &source_store(),
        &Selection::ThemeGroups(vec![ThemeGroupId::new("g1")]),
    );
    let (target, _) = target_with_courage();
    let service = ImportService::new(target.clone());

    let resolutions = [ResolutionEntry::new(
        ConflictType::ThemeNameExists,
        "t1",
        Resolution::Skip,
    )];
    let result = service.execute_import(&data, &resolutions).unwrap();

    assert_eq!(result.created_theme_groups, 1);
    let group = &target.list_theme_groups().unwrap()[0];
    assert_eq!(group.theme_ids.len(), 1);
    let loss = target
        .list_themes()
        .unwrap()
        .into_iter()
        .find(|t| t.name == "Loss")
        .unwrap();
    assert_eq!(group.theme_ids[0], loss.id);
    assert_no_dangling(target.as_ref());
}

#[test]
fn test_group_conflict_reuse_leaves_membership_alone() {
    let data = export(
        &source_store(),
        &Selection::ThemeGroups(vec![ThemeGroupId::new("g1")]),
    );
    let target = Arc::new(MemoryContentStore::new());
    target
        .create_theme(&NewTheme::new("Hope", "#00ff00").with_id("h1"))
        .unwrap();
    target
        .create_theme_group(
            &NewThemeGroup::new("Virtues", "#000000")
                .with_id("v1")
                .with_theme("h1"),
        )
        .unwrap();
    let service = ImportService::new(target.clone());

    let resolutions = [ResolutionEntry::new(
        ConflictType::ThemeGroupNameExists,
        "g1",
        Resolution::ReuseExisting,
    )];
    let result = service.execute_import(&data, &resolutions).unwrap();

    assert_eq!(result.created_themes, 2);
    assert_eq!(result.created_theme_groups, 0);
    let group = target
        .get_theme_group(&ThemeGroupId::new("v1"))
        .unwrap()
        .unwrap();
    assert_eq!(group.theme_ids, vec![ThemeId::new("h1")]);
}

#[test]
fn test_missing_resolution_fails_before_writing() {
    let data = export(&source_store(), &Selection::All);
    let (target, _) = target_with_courage();
    let service = ImportService::new(target.clone());

    let err = service.execute_import(&data, &[]).unwrap_err();
    assert!(matches!(
        err,
        Error::MissingResolution { conflict_type: ConflictType::ThemeNameExists, ref original_id }
            if original_id == "t1"
    ));
    assert_eq!(target.list_themes().unwrap().len(), 1);
    assert!(target.list_extracts().unwrap().is_empty());
}

#[test]
fn test_name_taken_after_preview_is_redetected() {
    let data = export(&source_store(), &Selection::Themes(vec![ThemeId::new("t1")]));
    let target = Arc::new(MemoryContentStore::new());
    let service = ImportService::new(target.clone());

    let preview = service.preview_import(&data).unwrap();
    assert!(preview.conflicts.is_empty());

    target.create_theme(&NewTheme::new("Courage", "#000")).unwrap();
    let err = service.execute_import(&data, &[]).unwrap_err();
    assert_eq!(err.code(), "MISSING_RESOLUTION");
}

// ============================================================================
// Partial failure
// ============================================================================

/// Store that rejects extracts whose text is "boom".
struct FlakyStore {
    inner: MemoryContentStore,
}

impl ContentStore for FlakyStore {
    fn create_theme(&self, theme: &NewTheme) -> Result<Theme> {
        self.inner.create_theme(theme)
    }

    fn create_theme_group(&self, group: &NewThemeGroup) -> Result<ThemeGroup> {
        self.inner.create_theme_group(group)
    }

    fn create_extract(&self, extract: &NewExtract) -> Result<Extract> {
        if extract.text == "boom" {
            return Err(Error::OperationFailed {
                operation: "create_extract".to_string(),
                cause: "disk on fire".to_string(),
            });
        }
        self.inner.create_extract(extract)
    }

    fn get_theme(&self, id: &ThemeId) -> Result<Option<Theme>> {
        self.inner.get_theme(id)
    }

    fn get_theme_group(&self, id: &ThemeGroupId) -> Result<Option<ThemeGroup>> {
        self.inner.get_theme_group(id)
    }

    fn list_themes(&self) -> Result<Vec<Theme>> {
        self.inner.list_themes()
    }

    fn list_theme_groups(&self) -> Result<Vec<ThemeGroup>> {
        self.inner.list_theme_groups()
    }

    fn list_extracts(&self) -> Result<Vec<Extract>> {
        self.inner.list_extracts()
    }
}

#[test]
fn test_one_failed_extract_does_not_stop_the_rest() {
    let source: Arc<dyn ContentStore> = Arc::new(MemoryContentStore::new());
    source
        .create_theme(&NewTheme::new("Courage", "#f00").with_id("t1"))
        .unwrap();
    for (i, text) in ["one", "two", "boom", "four", "five"].iter().enumerate() {
        source
            .create_extract(
                &NewExtract::new(*text, 1, "Show")
                    .with_id(format!("e{}", i + 1))
                    .with_theme("t1"),
            )
            .unwrap();
    }
    let data = export(&source, &Selection::All);

    let target = Arc::new(FlakyStore {
        inner: MemoryContentStore::new(),
    });
    let result = ImportService::new(target.clone())
        .execute_import(&data, &[])
        .unwrap();

    assert_eq!(result.created_themes, 1);
    assert_eq!(result.created_extracts, 4);
    assert_eq!(result.errors.len(), 1);
    assert_eq!(result.errors[0].entity, EntityKind::Extract);
    assert_eq!(result.errors[0].original_id, "e3");
    assert!(result.errors[0].message.contains("disk on fire"));
}

/// Store whose theme creation fails for one name.
struct RejectingStore {
    inner: MemoryContentStore,
    reject: &'static str,
}

impl ContentStore for RejectingStore {
    fn create_theme(&self, theme: &NewTheme) -> Result<Theme> {
        if theme.name == self.reject {
            return Err(Error::OperationFailed {
                operation: "create_theme".to_string(),
                cause: "rejected".to_string(),
            });
        }
        self.inner.create_theme(theme)
    }

    fn create_theme_group(&self, group: &NewThemeGroup) -> Result<ThemeGroup> {
        self.inner.create_theme_group(group)
    }

    fn create_extract(&self, extract: &NewExtract) -> Result<Extract> {
        self.inner.create_extract(extract)
    }

    fn get_theme(&self, id: &ThemeId) -> Result<Option<Theme>> {
        self.inner.get_theme(id)
    }

    fn get_theme_group(&self, id: &ThemeGroupId) -> Result<Option<ThemeGroup>> {
        self.inner.get_theme_group(id)
    }

    fn list_themes(&self) -> Result<Vec<Theme>> {
        self.inner.list_themes()
    }

    fn list_theme_groups(&self) -> Result<Vec<ThemeGroup>> {
        self.inner.list_theme_groups()
    }

    fn list_extracts(&self) -> Result<Vec<Extract>> {
        self.inner.list_extracts()
    }
}

#[test]
fn test_failed_theme_blocks_its_dependents() {
    let data = export(&source_store(), &Selection::All);
    let target = Arc::new(RejectingStore {
        inner: MemoryContentStore::new(),
        reject: "Courage",
    });

    let result = ImportService::new(target.clone())
        .execute_import(&data, &[])
        .unwrap();

    assert_eq!(result.created_themes, 1);
    assert_eq!(result.created_theme_groups, 0);
    assert_eq!(result.created_extracts, 1);
    let failed: Vec<(EntityKind, &str)> = result
        .errors
        .iter()
        .map(|e| (e.entity, e.original_id.as_str()))
        .collect();
    assert_eq!(
        failed,
        vec![
            (EntityKind::Theme, "t1"),
            (EntityKind::ThemeGroup, "g1"),
            (EntityKind::Extract, "e1"),
            (EntityKind::Extract, "e2"),
        ]
    );
    assert_no_dangling(target.as_ref());
}

// ============================================================================
// Round trip
// ============================================================================

/// Store contents with IDs replaced by names, for comparing across stores.
fn shape(store: &dyn ContentStore) -> (Vec<String>, Vec<(String, Vec<String>)>, Vec<(String, Option<String>)>) {
    let contents = store.load_contents().unwrap();
    let theme_name = |id: &ThemeId| {
        contents
            .themes
            .iter()
            .find(|t| &t.id == id)
            .map(|t| t.name.clone())
            .unwrap()
    };
    let themes = contents.themes.iter().map(|t| t.name.clone()).collect();
    let groups = contents
        .theme_groups
        .iter()
        .map(|g| (g.name.clone(), g.theme_ids.iter().map(theme_name).collect()))
        .collect();
    let extracts = contents
        .extracts
        .iter()
        .map(|e| (e.text.clone(), e.theme_id.as_ref().map(theme_name)))
        .collect();
    (themes, groups, extracts)
}

#[test]
fn test_round_trip_into_empty_store() {
    let source = source_store();
    let data = export(&source, &Selection::All);

    let target: Arc<dyn ContentStore> = Arc::new(SqliteContentStore::in_memory().unwrap());
    let result = ImportService::new(Arc::clone(&target))
        .execute_import(&data, &[])
        .unwrap();
    assert_eq!(result.total_created(), 6);

    assert_eq!(shape(source.as_ref()), shape(target.as_ref()));

    let reexported = ExportService::new(target).assemble(&Selection::All).unwrap();
    assert_eq!(reexported.extracts[0].episode, Some(1));
    assert_eq!(reexported.metadata.total_extracts, 3);
}

#[test]
fn test_reimport_with_reuse_is_idempotent() {
    let source = source_store();
    let data = export(&source, &Selection::All);
    let service = ImportService::new(Arc::clone(&source));

    let preview = service.preview_import(&data).unwrap();
    assert_eq!(preview.summary.conflicts_count, 3);
    let resolutions: Vec<_> = preview
        .conflicts
        .iter()
        .map(|c| ResolutionEntry::for_conflict(c, Resolution::ReuseExisting))
        .collect();

    let result = service.execute_import(&data, &resolutions).unwrap();
    assert_eq!(result.created_themes + result.created_theme_groups, 0);
    assert_eq!(source.list_themes().unwrap().len(), 2);
    assert_unique_names(source.as_ref());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_concurrent_imports_keep_names_unique() {
    let data = Arc::new(export(&source_store(), &Selection::All));
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("content.sqlite");

    // Open every connection up front so schema creation is not racing.
    let stores: Vec<Arc<dyn ContentStore>> = (0..4)
        .map(|_| Arc::new(SqliteContentStore::new(&path).unwrap()) as Arc<dyn ContentStore>)
        .collect();

    let handles: Vec<_> = stores
        .iter()
        .map(|store| {
            let store = Arc::clone(store);
            let data = Arc::clone(&data);
            thread::spawn(move || {
                let resolutions = [
                    ResolutionEntry::new(ConflictType::ThemeNameExists, "t1", Resolution::Skip),
                    ResolutionEntry::new(ConflictType::ThemeNameExists, "t2", Resolution::Skip),
                    ResolutionEntry::new(ConflictType::ThemeGroupNameExists, "g1", Resolution::Skip),
                ];
                ImportService::new(store).execute_import(&data, &resolutions)
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap().unwrap();
    }

    let check = SqliteContentStore::new(&path).unwrap();
    assert_unique_names(&check);
    assert_no_dangling(&check);
    assert_eq!(check.list_themes().unwrap().len(), 2);
    assert!(check.list_theme_groups().unwrap().len() <= 1);
}

/// Store that parks every theme creation until the test releases it.
struct GatedStore {
    inner: MemoryContentStore,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl ContentStore for GatedStore {
    fn create_theme(&self, theme: &NewTheme) -> Result<Theme> {
        let _ = self.entered.lock().unwrap().send(());
        let _ = self.release.lock().unwrap().recv();
        self.inner.create_theme(theme)
    }

    fn create_theme_group(&self, group: &NewThemeGroup) -> Result<ThemeGroup> {
        self.inner.create_theme_group(group)
    }

    fn create_extract(&self, extract: &NewExtract) -> Result<Extract> {
        self.inner.create_extract(extract)
    }

    fn get_theme(&self, id: &ThemeId) -> Result<Option<Theme>> {
        self.inner.get_theme(id)
    }

    fn get_theme_group(&self, id: &ThemeGroupId) -> Result<Option<ThemeGroup>> {
        self.inner.get_theme_group(id)
    }

    fn list_themes(&self) -> Result<Vec<Theme>> {
        self.inner.list_themes()
    }

    fn list_theme_groups(&self) -> Result<Vec<ThemeGroup>> {
        self.inner.list_theme_groups()
    }

    fn list_extracts(&self) -> Result<Vec<Extract>> {
        self.inner.list_extracts()
    }
}

#[test]
fn test_session_rejects_second_execute_while_importing() {
    let data = export(&source_store(), &Selection::Themes(vec![ThemeId::new("t1")]));
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let store = Arc::new(GatedStore {
        inner: MemoryContentStore::new(),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    });
    let session = Arc::new(ImportSession::new(Arc::new(ImportService::new(store))));
    session.upload(data).unwrap();

    let worker = {
        let session = Arc::clone(&session);
        thread::spawn(move || session.execute())
    };

    entered_rx.recv().unwrap();
    assert_eq!(session.state(), SessionState::Importing);
    assert!(matches!(session.execute(), Err(Error::InvalidTransition { .. })));
    assert!(matches!(session.reset(), Err(Error::InvalidTransition { .. })));

    drop(release_tx);
    let result = worker.join().unwrap().unwrap();
    assert_eq!(result.created_themes, 1);
    assert_eq!(result.created_extracts, 2);
    assert_eq!(session.state(), SessionState::Success);
    session.reset().unwrap();
}

#[test]
fn test_session_hard_failure_returns_to_preview() {
    let data = export(&source_store(), &Selection::Themes(vec![ThemeId::new("t1")]));
    let target = Arc::new(MemoryContentStore::new());
    let session = ImportSession::new(Arc::new(ImportService::new(target.clone())));
    session.upload(data).unwrap();

    // A conflict appears after the preview; the session has no resolution for it.
    let existing = target.create_theme(&NewTheme::new("Courage", "#000")).unwrap();
    let err = session.execute().unwrap_err();

    assert_eq!(err.code(), "MISSING_RESOLUTION");
    assert_eq!(session.state(), SessionState::Preview);
    assert!(session.last_error().is_some());

    // The late conflict is now part of the preview and can be resolved.
    assert_eq!(session.preview().unwrap().summary.conflicts_count, 1);
    session.review_conflicts().unwrap();
    let result = session.execute().unwrap();

    assert_eq!(session.state(), SessionState::Success);
    assert_eq!(result.created_themes, 0);
    assert_eq!(result.created_extracts, 2);
    assert!(
        target
            .list_extracts()
            .unwrap()
            .iter()
            .all(|e| e.theme_id.as_ref() == Some(&existing.id))
    );
}
