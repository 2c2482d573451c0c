//! `SQLite`-backed [`ContentStore`].

use crate::models::{
    EntityKind, Extract, ExtractId, NewExtract, NewTheme, NewThemeGroup, Theme, ThemeGroup,
    ThemeGroupId, ThemeId, Timing,
};
use crate::storage::sqlite::{
    acquire_lock, configure_connection, record_operation_metrics, with_transaction,
};
use crate::storage::traits::{ContentStore, StoreContents};
use crate::{Error, Result};
use rusqlite::{Connection, OptionalExtension, params};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use tracing::instrument;

const BACKEND: &str = "sqlite";

/// `SQLite`-based content store.
///
/// # Concurrency Model
///
/// Uses a `Mutex<Connection>` for thread-safe access within the process.
/// Every create runs in a `BEGIN IMMEDIATE` transaction, so the name and
/// reference checks and the insert are atomic against other processes
/// sharing the database file as well. Name uniqueness is additionally backed
/// by `UNIQUE` constraints and references by foreign keys.
///
/// # Schema
///
/// - `themes(id, name UNIQUE, description, color)`
/// - `theme_groups(id, name UNIQUE, description, color)`
/// - `theme_group_members(group_id, theme_id, position)`
/// - `extracts(id, text, anime_*, timing_*, episode, season, characters, theme_id, is_used_in_video)`
pub struct SqliteContentStore {
    /// Protected by Mutex because `rusqlite::Connection` is not `Sync`.
    conn: Mutex<Connection>,
    /// Path to the database (None for in-memory).
    db_path: Option<PathBuf>,
}

struct ExtractRow {
    id: String,
    text: String,
    anime_id: i64,
    anime_title: String,
    anime_image: Option<String>,
    timing_start: String,
    timing_end: String,
    episode: Option<u32>,
    season: Option<u32>,
    characters: String,
    theme_id: Option<String>,
    is_used_in_video: bool,
}

impl ExtractRow {
    fn into_extract(self) -> Result<Extract> {
        let characters =
            serde_json::from_str(&self.characters).map_err(|e| Error::OperationFailed {
                operation: "decode_characters".to_string(),
                cause: format!("extract '{}': {e}", self.id),
            })?;
        Ok(Extract {
            id: ExtractId::new(self.id),
            text: self.text,
            anime_id: self.anime_id,
            anime_title: self.anime_title,
            anime_image: self.anime_image,
            timing: Timing::new(self.timing_start, self.timing_end),
            episode: self.episode,
            season: self.season,
            characters,
            theme_id: self.theme_id.map(ThemeId::new),
            is_used_in_video: self.is_used_in_video,
        })
    }
}

impl SqliteContentStore {
    /// Opens (or creates) a store at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or initialized.
    pub fn new(db_path: impl Into<PathBuf>) -> Result<Self> {
        let db_path = db_path.into();
        if let Some(parent) = db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| Error::OperationFailed {
                operation: "create_data_dir".to_string(),
                cause: format!("{}: {e}", parent.display()),
            })?;
        }
        let conn = Connection::open(&db_path).map_err(|e| Error::OperationFailed {
            operation: "open_sqlite".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: Some(db_path),
        };
        store.initialize()?;
        Ok(store)
    }

    /// Creates an in-memory store (useful for testing).
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be created.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| Error::OperationFailed {
            operation: "open_sqlite_in_memory".to_string(),
            cause: e.to_string(),
        })?;

        let store = Self {
            conn: Mutex::new(conn),
            db_path: None,
        };
        store.initialize()?;
        Ok(store)
    }

    /// Returns the database path (None for in-memory).
    #[must_use]
    pub fn db_path(&self) -> Option<&Path> {
        self.db_path.as_deref()
    }

    fn initialize(&self) -> Result<()> {
        let conn = acquire_lock(&self.conn);
        configure_connection(&conn)?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS themes (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                color TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS theme_groups (
                id TEXT PRIMARY KEY,
                name TEXT NOT NULL UNIQUE,
                description TEXT,
                color TEXT NOT NULL
            );
            CREATE TABLE IF NOT EXISTS theme_group_members (
                group_id TEXT NOT NULL REFERENCES theme_groups(id),
                theme_id TEXT NOT NULL REFERENCES themes(id),
                position INTEGER NOT NULL,
                PRIMARY KEY (group_id, theme_id)
            );
            CREATE TABLE IF NOT EXISTS extracts (
                id TEXT PRIMARY KEY,
                text TEXT NOT NULL,
                anime_id INTEGER NOT NULL,
                anime_title TEXT NOT NULL,
                anime_image TEXT,
                timing_start TEXT NOT NULL,
                timing_end TEXT NOT NULL,
                episode INTEGER,
                season INTEGER,
                characters TEXT NOT NULL DEFAULT '[]',
                theme_id TEXT REFERENCES themes(id),
                is_used_in_video INTEGER NOT NULL DEFAULT 0
            );
            CREATE INDEX IF NOT EXISTS idx_extracts_theme_id ON extracts(theme_id);
            CREATE INDEX IF NOT EXISTS idx_members_theme_id ON theme_group_members(theme_id);",
        )
        .map_err(|e| Error::OperationFailed {
            operation: "create_schema".to_string(),
            cause: e.to_string(),
        })?;

        Ok(())
    }

    /// Runs a store operation, recording its metrics.
    fn timed<T>(&self, operation: &'static str, f: impl FnOnce(&Connection) -> Result<T>) -> Result<T> {
        let start = Instant::now();
        let result = {
            let conn = acquire_lock(&self.conn);
            f(&conn)
        };
        let status = if result.is_ok() { "success" } else { "error" };
        record_operation_metrics(BACKEND, operation, start, status);
        result
    }
}

/// Maps an insert failure to the crate error, recognising name collisions.
fn map_insert_error(e: rusqlite::Error, kind: EntityKind, name: &str, operation: &str) -> Error {
    if let rusqlite::Error::SqliteFailure(ref err, _) = e {
        if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_UNIQUE {
            return Error::NameConflict {
                kind,
                name: name.to_string(),
            };
        }
    }
    Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn query_error(operation: &str) -> impl FnOnce(rusqlite::Error) -> Error + '_ {
    move |e| Error::OperationFailed {
        operation: operation.to_string(),
        cause: e.to_string(),
    }
}

fn theme_exists(conn: &Connection, id: &ThemeId) -> Result<bool> {
    conn.query_row(
        "SELECT 1 FROM themes WHERE id = ?1",
        params![id.as_str()],
        |_| Ok(()),
    )
    .optional()
    .map(|row| row.is_some())
    .map_err(query_error("theme_exists"))
}

fn require_theme(conn: &Connection, id: &ThemeId) -> Result<()> {
    if theme_exists(conn, id)? {
        Ok(())
    } else {
        Err(Error::NotFound {
            kind: EntityKind::Theme,
            id: id.to_string(),
        })
    }
}

/// Loads themes, optionally restricted to one ID.
fn query_themes(conn: &Connection, id: Option<&ThemeId>) -> Result<Vec<Theme>> {
    let mut stmt = conn
        .prepare(
            "SELECT t.id, t.name, t.description, t.color,
                    (SELECT COUNT(*) FROM extracts e WHERE e.theme_id = t.id)
             FROM themes t
             WHERE ?1 IS NULL OR t.id = ?1
             ORDER BY t.rowid",
        )
        .map_err(query_error("prepare_list_themes"))?;

    let rows = stmt
        .query_map(params![id.map(ThemeId::as_str)], |row| {
            let count: i64 = row.get(4)?;
            Ok(Theme {
                id: ThemeId::new(row.get::<_, String>(0)?),
                name: row.get(1)?,
                description: row.get(2)?,
                color: row.get(3)?,
                extract_count: usize::try_from(count).unwrap_or(0),
            })
        })
        .map_err(query_error("list_themes"))?;

    rows.collect::<rusqlite::Result<Vec<_>>>()
        .map_err(query_error("list_themes_row"))
}

/// Loads theme groups with members, optionally restricted to one ID.
fn query_theme_groups(conn: &Connection, id: Option<&ThemeGroupId>) -> Result<Vec<ThemeGroup>> {
    let counts: HashMap<ThemeId, usize> = query_themes(conn, None)?
        .into_iter()
        .map(|t| (t.id, t.extract_count))
        .collect();

    let mut members: HashMap<String, Vec<ThemeId>> = HashMap::new();
    {
        let mut stmt = conn
            .prepare(
                "SELECT group_id, theme_id FROM theme_group_members
                 WHERE ?1 IS NULL OR group_id = ?1
                 ORDER BY group_id, position",
            )
            .map_err(query_error("prepare_list_members"))?;
        let rows = stmt
            .query_map(params![id.map(ThemeGroupId::as_str)], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
            })
            .map_err(query_error("list_members"))?;
        for row in rows {
            let (group_id, theme_id) = row.map_err(query_error("list_members_row"))?;
            members
                .entry(group_id)
                .or_default()
                .push(ThemeId::new(theme_id));
        }
    }

    let mut stmt = conn
        .prepare(
            "SELECT id, name, description, color FROM theme_groups
             WHERE ?1 IS NULL OR id = ?1
             ORDER BY rowid",
        )
        .map_err(query_error("prepare_list_theme_groups"))?;
    let rows = stmt
        .query_map(params![id.map(ThemeGroupId::as_str)], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
            ))
        })
        .map_err(query_error("list_theme_groups"))?;

    let mut groups = Vec::new();
    for row in rows {
        let (group_id, name, description, color) =
            row.map_err(query_error("list_theme_groups_row"))?;
        let theme_ids = members.remove(&group_id).unwrap_or_default();
        let extract_count = theme_ids
            .iter()
            .map(|t| counts.get(t).copied().unwrap_or(0))
            .sum();
        groups.push(ThemeGroup {
            id: ThemeGroupId::new(group_id),
            name,
            description,
            color,
            theme_ids,
            extract_count,
        });
    }
    Ok(groups)
}

fn query_extracts(conn: &Connection) -> Result<Vec<Extract>> {
    let mut stmt = conn
        .prepare(
            "SELECT id, text, anime_id, anime_title, anime_image, timing_start, timing_end,
                    episode, season, characters, theme_id, is_used_in_video
             FROM extracts
             ORDER BY rowid",
        )
        .map_err(query_error("prepare_list_extracts"))?;

    let rows = stmt
        .query_map([], |row| {
            Ok(ExtractRow {
                id: row.get(0)?,
                text: row.get(1)?,
                anime_id: row.get(2)?,
                anime_title: row.get(3)?,
                anime_image: row.get(4)?,
                timing_start: row.get(5)?,
                timing_end: row.get(6)?,
                episode: row.get(7)?,
                season: row.get(8)?,
                characters: row.get(9)?,
                theme_id: row.get(10)?,
                is_used_in_video: row.get(11)?,
            })
        })
        .map_err(query_error("list_extracts"))?;

    rows.map(|row| row.map_err(query_error("list_extracts_row"))?.into_extract())
        .collect()
}

impl ContentStore for SqliteContentStore {
    #[instrument(skip(self, theme), fields(operation = "create_theme", backend = "sqlite", theme.id = %theme.id))]
    fn create_theme(&self, theme: &NewTheme) -> Result<Theme> {
        self.timed("create_theme", |conn| {
            with_transaction(conn, true, |conn| {
                conn.execute(
                    "INSERT INTO themes (id, name, description, color) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        theme.id.as_str(),
                        theme.name,
                        theme.description.as_deref(),
                        theme.color
                    ],
                )
                .map_err(|e| map_insert_error(e, EntityKind::Theme, &theme.name, "insert_theme"))?;

                Ok(Theme {
                    id: theme.id.clone(),
                    name: theme.name.clone(),
                    description: theme.description.clone(),
                    color: theme.color.clone(),
                    extract_count: 0,
                })
            })
        })
    }

    #[instrument(skip(self, group), fields(operation = "create_theme_group", backend = "sqlite", group.id = %group.id))]
    fn create_theme_group(&self, group: &NewThemeGroup) -> Result<ThemeGroup> {
        self.timed("create_theme_group", |conn| {
            with_transaction(conn, true, |conn| {
                for theme_id in &group.theme_ids {
                    require_theme(conn, theme_id)?;
                }

                conn.execute(
                    "INSERT INTO theme_groups (id, name, description, color) VALUES (?1, ?2, ?3, ?4)",
                    params![
                        group.id.as_str(),
                        group.name,
                        group.description.as_deref(),
                        group.color
                    ],
                )
                .map_err(|e| {
                    map_insert_error(e, EntityKind::ThemeGroup, &group.name, "insert_theme_group")
                })?;

                for (position, theme_id) in group.theme_ids.iter().enumerate() {
                    #[allow(clippy::cast_possible_wrap)]
                    let position = position as i64;
                    conn.execute(
                        "INSERT OR IGNORE INTO theme_group_members (group_id, theme_id, position)
                         VALUES (?1, ?2, ?3)",
                        params![group.id.as_str(), theme_id.as_str(), position],
                    )
                    .map_err(query_error("insert_group_member"))?;
                }

                query_theme_groups(conn, Some(&group.id))?
                    .pop()
                    .ok_or_else(|| Error::NotFound {
                        kind: EntityKind::ThemeGroup,
                        id: group.id.to_string(),
                    })
            })
        })
    }

    #[instrument(skip(self, extract), fields(operation = "create_extract", backend = "sqlite", extract.id = %extract.id))]
    fn create_extract(&self, extract: &NewExtract) -> Result<Extract> {
        self.timed("create_extract", |conn| {
            with_transaction(conn, true, |conn| {
                if let Some(theme_id) = &extract.theme_id {
                    require_theme(conn, theme_id)?;
                }

                let characters =
                    serde_json::to_string(&extract.characters).map_err(|e| {
                        Error::OperationFailed {
                            operation: "encode_characters".to_string(),
                            cause: e.to_string(),
                        }
                    })?;

                conn.execute(
                    "INSERT INTO extracts (id, text, anime_id, anime_title, anime_image,
                                           timing_start, timing_end, episode, season,
                                           characters, theme_id, is_used_in_video)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, 0)",
                    params![
                        extract.id.as_str(),
                        extract.text,
                        extract.anime_id,
                        extract.anime_title,
                        extract.anime_image.as_deref(),
                        extract.timing.start,
                        extract.timing.end,
                        extract.episode,
                        extract.season,
                        characters,
                        extract.theme_id.as_ref().map(ThemeId::as_str),
                    ],
                )
                .map_err(query_error("insert_extract"))?;

                Ok(extract.clone().into_extract())
            })
        })
    }

    #[instrument(skip(self), fields(operation = "get_theme", backend = "sqlite", theme.id = %id))]
    fn get_theme(&self, id: &ThemeId) -> Result<Option<Theme>> {
        self.timed("get_theme", |conn| Ok(query_themes(conn, Some(id))?.pop()))
    }

    #[instrument(skip(self), fields(operation = "get_theme_group", backend = "sqlite", group.id = %id))]
    fn get_theme_group(&self, id: &ThemeGroupId) -> Result<Option<ThemeGroup>> {
        self.timed("get_theme_group", |conn| {
            Ok(query_theme_groups(conn, Some(id))?.pop())
        })
    }

    fn list_themes(&self) -> Result<Vec<Theme>> {
        self.timed("list_themes", |conn| query_themes(conn, None))
    }

    fn list_theme_groups(&self) -> Result<Vec<ThemeGroup>> {
        self.timed("list_theme_groups", |conn| query_theme_groups(conn, None))
    }

    fn list_extracts(&self) -> Result<Vec<Extract>> {
        self.timed("list_extracts", query_extracts)
    }

    #[instrument(skip(self), fields(operation = "load_contents", backend = "sqlite"))]
    fn load_contents(&self) -> Result<StoreContents> {
        self.timed("load_contents", |conn| {
            with_transaction(conn, false, |conn| {
                Ok(StoreContents {
                    themes: query_themes(conn, None)?,
                    theme_groups: query_theme_groups(conn, None)?,
                    extracts: query_extracts(conn)?,
                })
            })
        })
    }

    fn theme_exists(&self, id: &ThemeId) -> Result<bool> {
        self.timed("theme_exists", |conn| theme_exists(conn, id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn seeded_store() -> SqliteContentStore {
        let store = SqliteContentStore::in_memory().unwrap();
        store
            .create_theme(&NewTheme::new("Courage", "#f00").with_id("t1"))
            .unwrap();
        store
            .create_theme(
                &NewTheme::new("Loss", "#00f")
                    .with_id("t2")
                    .with_description("Grief and letting go"),
            )
            .unwrap();
        store
    }

    #[test]
    fn test_create_and_list_themes_in_order() {
        let store = seeded_store();
        let themes = store.list_themes().unwrap();
        assert_eq!(themes.len(), 2);
        assert_eq!(themes[0].name, "Courage");
        assert_eq!(themes[1].description.as_deref(), Some("Grief and letting go"));
    }

    #[test]
    fn test_duplicate_theme_name_is_name_conflict() {
        let store = seeded_store();
        let err = store
            .create_theme(&NewTheme::new("Courage", "#000"))
            .unwrap_err();
        assert_eq!(err.code(), "NAME_CONFLICT");
        assert_eq!(store.list_themes().unwrap().len(), 2);
    }

    #[test]
    fn test_duplicate_group_name_is_name_conflict() {
        let store = seeded_store();
        store
            .create_theme_group(&NewThemeGroup::new("Virtues", "#fff").with_theme("t1"))
            .unwrap();
        let err = store
            .create_theme_group(&NewThemeGroup::new("Virtues", "#000"))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::NameConflict {
                kind: EntityKind::ThemeGroup,
                ..
            }
        ));
    }

    #[test]
    fn test_group_with_missing_member_is_rejected_atomically() {
        let store = seeded_store();
        let err = store
            .create_theme_group(
                &NewThemeGroup::new("Broken", "#fff")
                    .with_theme("t1")
                    .with_theme("missing"),
            )
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(store.list_theme_groups().unwrap().is_empty());
    }

    #[test]
    fn test_extract_round_trips_all_fields() {
        let store = seeded_store();
        let request = NewExtract::new("I won't run away", 20, "Naruto")
            .with_theme("t1")
            .with_timing("00:12:01", "00:12:09")
            .with_episode(3)
            .with_character(json!({"name": "Naruto Uzumaki", "role": "MAIN"}));
        store.create_extract(&request).unwrap();

        let extracts = store.list_extracts().unwrap();
        assert_eq!(extracts.len(), 1);
        let extract = &extracts[0];
        assert_eq!(extract.theme_id, Some(ThemeId::new("t1")));
        assert_eq!(extract.timing.start, "00:12:01");
        assert_eq!(extract.episode, Some(3));
        assert_eq!(extract.characters[0]["role"], "MAIN");
        assert!(!extract.is_used_in_video);
    }

    #[test]
    fn test_extract_with_unknown_theme_is_rejected() {
        let store = seeded_store();
        let err = store
            .create_extract(&NewExtract::new("x", 1, "Show").with_theme("nope"))
            .unwrap_err();
        assert!(matches!(err, Error::NotFound { .. }));
        assert!(store.list_extracts().unwrap().is_empty());
    }

    #[test]
    fn test_group_extract_count_sums_members() {
        let store = seeded_store();
        store
            .create_theme_group(
                &NewThemeGroup::new("Both", "#fff")
                    .with_id("g1")
                    .with_theme("t1")
                    .with_theme("t2"),
            )
            .unwrap();
        store
            .create_extract(&NewExtract::new("a", 1, "Show").with_theme("t1"))
            .unwrap();
        store
            .create_extract(&NewExtract::new("b", 1, "Show").with_theme("t2"))
            .unwrap();

        let group = store
            .get_theme_group(&ThemeGroupId::new("g1"))
            .unwrap()
            .unwrap();
        assert_eq!(group.theme_ids, vec![ThemeId::new("t1"), ThemeId::new("t2")]);
        assert_eq!(group.extract_count, 2);

        let contents = store.load_contents().unwrap();
        assert_eq!(contents.themes[0].extract_count, 1);
        assert_eq!(contents.extracts.len(), 2);
    }

    #[test]
    fn test_file_backed_store_persists() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("content.sqlite");
        {
            let store = SqliteContentStore::new(&path).unwrap();
            store
                .create_theme(&NewTheme::new("Courage", "#f00"))
                .unwrap();
        }
        let store = SqliteContentStore::new(&path).unwrap();
        assert_eq!(store.db_path(), Some(path.as_path()));
        assert_eq!(store.list_themes().unwrap().len(), 1);
    }
}
