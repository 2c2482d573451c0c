//! Import session state machine.
//!
//! ```text
//! UPLOAD -> PREVIEW -> (CONFLICTS) -> IMPORTING -> SUCCESS
//!                ^                        |
//!                +------- hard failure ---+
//! ```
//!
//! Every state except `IMPORTING` can be reset back to `UPLOAD`. The session
//! only sequences calls into [`ImportService`]; it makes no import decisions
//! of its own beyond defaulting each conflict to `REUSE_EXISTING`.

use crate::io::conflicts::ConflictType;
use crate::io::plan::{Resolution, ResolutionEntry};
use crate::io::services::import::{ImportPreview, ImportResult, ImportService};
use crate::{Error, Result};
use serde::Serialize;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionState {
    /// Waiting for snapshot bytes.
    Upload,
    /// Snapshot decoded, preview available.
    Preview,
    /// Caller is reviewing conflict resolutions.
    Conflicts,
    /// An import is in flight.
    Importing,
    /// The import ran, possibly with per-item errors.
    Success,
}

impl SessionState {
    /// Returns the string representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Upload => "UPLOAD",
            Self::Preview => "PREVIEW",
            Self::Conflicts => "CONFLICTS",
            Self::Importing => "IMPORTING",
            Self::Success => "SUCCESS",
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug)]
struct Inner {
    state: SessionState,
    data: Option<Arc<[u8]>>,
    preview: Option<ImportPreview>,
    resolutions: Vec<ResolutionEntry>,
    result: Option<ImportResult>,
    last_error: Option<String>,
}

impl Inner {
    const fn new() -> Self {
        Self {
            state: SessionState::Upload,
            data: None,
            preview: None,
            resolutions: Vec::new(),
            result: None,
            last_error: None,
        }
    }

    fn reject(&self, action: &str) -> Error {
        Error::InvalidTransition {
            state: self.state.to_string(),
            action: action.to_string(),
        }
    }

    /// Installs a fresh preview.
    ///
    /// Conflicts that were already resolved keep their resolution; newly
    /// detected ones default to `REUSE_EXISTING`.
    fn adopt_preview(&mut self, preview: ImportPreview) {
        let resolutions = preview
            .conflicts
            .iter()
            .map(|c| {
                let kept = self
                    .resolutions
                    .iter()
                    .find(|e| e.conflict_type == c.conflict_type && e.original_id == c.original_id())
                    .map_or(Resolution::ReuseExisting, |e| e.resolution);
                ResolutionEntry::for_conflict(c, kept)
            })
            .collect();
        self.resolutions = resolutions;
        self.preview = Some(preview);
    }

    fn conflicts_count(&self) -> usize {
        self.preview
            .as_ref()
            .map_or(0, |p| p.summary.conflicts_count)
    }
}

/// One upload-to-result import workflow.
///
/// All methods take `&self`; the session can be shared between a UI thread
/// and a worker. Only one [`ImportSession::execute`] may be in flight.
pub struct ImportSession {
    service: Arc<ImportService>,
    inner: Mutex<Inner>,
}

impl ImportSession {
    /// Creates a session in the `UPLOAD` state.
    #[must_use]
    pub fn new(service: Arc<ImportService>) -> Self {
        Self {
            service,
            inner: Mutex::new(Inner::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        match self.inner.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                tracing::warn!("import session lock was poisoned, recovering");
                poisoned.into_inner()
            },
        }
    }

    /// Current state.
    pub fn state(&self) -> SessionState {
        self.lock().state
    }

    /// The current preview, if one was produced.
    pub fn preview(&self) -> Option<ImportPreview> {
        self.lock().preview.clone()
    }

    /// The current resolutions, one per conflict.
    pub fn resolutions(&self) -> Vec<ResolutionEntry> {
        self.lock().resolutions.clone()
    }

    /// The result of the last completed import.
    pub fn result(&self) -> Option<ImportResult> {
        self.lock().result.clone()
    }

    /// The last error reported by this session.
    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    /// Decodes snapshot bytes and moves to `PREVIEW`.
    ///
    /// Every conflict starts out resolved as `REUSE_EXISTING`.
    ///
    /// # Errors
    ///
    /// Structural errors leave the session in `UPLOAD` with the error recorded.
    pub fn upload(&self, data: Vec<u8>) -> Result<ImportPreview> {
        let mut inner = self.lock();
        if inner.state != SessionState::Upload {
            return Err(inner.reject("upload"));
        }

        let preview = match self.service.preview_import(&data) {
            Ok(preview) => preview,
            Err(e) => {
                inner.last_error = Some(e.to_string());
                return Err(e);
            },
        };

        inner.resolutions.clear();
        inner.adopt_preview(preview.clone());
        inner.data = Some(Arc::from(data));
        inner.last_error = None;
        inner.state = SessionState::Preview;
        tracing::debug!(conflicts = inner.resolutions.len(), "Session moved to PREVIEW");
        Ok(preview)
    }

    /// Moves from `PREVIEW` to `CONFLICTS`.
    ///
    /// Only allowed when the preview has at least one conflict.
    pub fn review_conflicts(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state != SessionState::Preview || inner.conflicts_count() == 0 {
            return Err(inner.reject("review conflicts"));
        }
        inner.state = SessionState::Conflicts;
        Ok(())
    }

    /// Changes the resolution of one detected conflict.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if no such conflict was detected.
    pub fn set_resolution(
        &self,
        conflict_type: ConflictType,
        original_id: &str,
        resolution: Resolution,
    ) -> Result<()> {
        let mut inner = self.lock();
        if !matches!(inner.state, SessionState::Preview | SessionState::Conflicts) {
            return Err(inner.reject("set resolution"));
        }
        let entry = inner
            .resolutions
            .iter_mut()
            .find(|e| e.conflict_type == conflict_type && e.original_id == original_id)
            .ok_or_else(|| {
                Error::InvalidInput(format!(
                    "no {conflict_type} conflict for '{original_id}'"
                ))
            })?;
        entry.resolution = resolution;
        Ok(())
    }

    /// Sets the same resolution for every conflict.
    pub fn resolve_all(&self, resolution: Resolution) -> Result<()> {
        let mut inner = self.lock();
        if !matches!(inner.state, SessionState::Preview | SessionState::Conflicts) {
            return Err(inner.reject("set resolution"));
        }
        for entry in &mut inner.resolutions {
            entry.resolution = resolution;
        }
        Ok(())
    }

    /// Runs the import.
    ///
    /// Allowed from `CONFLICTS`, or from `PREVIEW` when there is nothing to
    /// resolve. The lock is released while the import runs, so state can be
    /// observed from other threads in the meantime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidTransition`] from any other state, including a
    /// concurrent `IMPORTING`. A hard failure of the import itself moves the
    /// session back to `PREVIEW` and is returned. The preview is then taken
    /// again against the live store, so conflicts that appeared since upload
    /// can be resolved before retrying.
    pub fn execute(&self) -> Result<ImportResult> {
        let (data, resolutions) = {
            let mut inner = self.lock();
            let ready = match inner.state {
                SessionState::Conflicts => true,
                SessionState::Preview => inner.conflicts_count() == 0,
                _ => false,
            };
            let Some(data) = inner.data.clone().filter(|_| ready) else {
                return Err(inner.reject("execute"));
            };
            inner.state = SessionState::Importing;
            inner.last_error = None;
            (data, inner.resolutions.clone())
        };

        tracing::info!(resolutions = resolutions.len(), "Session import started");
        let outcome = self.service.execute_import(&data, &resolutions);

        let mut inner = self.lock();
        match outcome {
            Ok(result) => {
                inner.state = SessionState::Success;
                inner.result = Some(result.clone());
                Ok(result)
            },
            Err(e) => {
                tracing::warn!(error = %e, "Session import failed, back to PREVIEW");
                inner.state = SessionState::Preview;
                inner.last_error = Some(e.to_string());
                match self.service.preview_import(&data) {
                    Ok(preview) => {
                        inner.adopt_preview(preview);
                        tracing::debug!(
                            conflicts = inner.resolutions.len(),
                            "Preview refreshed after failed import"
                        );
                    },
                    Err(refresh) => {
                        tracing::warn!(error = %refresh, "Could not refresh preview");
                    },
                }
                Err(e)
            },
        }
    }

    /// Discards everything and returns to `UPLOAD`.
    ///
    /// # Errors
    ///
    /// Rejected while `IMPORTING`; an in-flight import cannot be cancelled.
    pub fn reset(&self) -> Result<()> {
        let mut inner = self.lock();
        if inner.state == SessionState::Importing {
            return Err(inner.reject("reset"));
        }
        *inner = Inner::new();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::NewTheme;
    use crate::storage::{ContentStore, MemoryContentStore};
    use serde_json::json;

    fn bytes() -> Vec<u8> {
        serde_json::to_vec(&json!({
            "formatVersion": "1.0",
            "themes": [{"originalId": "t1", "name": "Courage", "color": "#f00"}],
            "themeGroups": [],
            "extracts": []
        }))
        .unwrap()
    }

    fn session(with_conflict: bool) -> (ImportSession, Arc<MemoryContentStore>) {
        let store = Arc::new(MemoryContentStore::new());
        if with_conflict {
            store
                .create_theme(&NewTheme::new("Courage", "#000").with_id("x1"))
                .unwrap();
        }
        let service = Arc::new(ImportService::new(store.clone()));
        (ImportSession::new(service), store)
    }

    #[test]
    fn test_malformed_upload_stays_in_upload() {
        let (session, _) = session(false);
        let err = session.upload(b"{}".to_vec()).unwrap_err();
        assert!(err.is_structural());
        assert_eq!(session.state(), SessionState::Upload);
        assert!(session.last_error().is_some());
    }

    #[test]
    fn test_no_conflicts_goes_straight_to_import() {
        let (session, store) = session(false);
        session.upload(bytes()).unwrap();
        assert!(session.review_conflicts().is_err());

        let result = session.execute().unwrap();
        assert_eq!(result.created_themes, 1);
        assert_eq!(session.state(), SessionState::Success);
        assert_eq!(store.list_themes().unwrap().len(), 1);
    }

    #[test]
    fn test_conflicts_default_to_reuse() {
        let (session, store) = session(true);
        let preview = session.upload(bytes()).unwrap();
        assert_eq!(preview.summary.conflicts_count, 1);
        assert_eq!(session.resolutions()[0].resolution, Resolution::ReuseExisting);

        // Conflicts must be reviewed before executing
        assert!(matches!(session.execute(), Err(Error::InvalidTransition { .. })));

        session.review_conflicts().unwrap();
        let result = session.execute().unwrap();
        assert_eq!(result.created_themes, 0);
        assert_eq!(store.list_themes().unwrap().len(), 1);
    }

    #[test]
    fn test_set_resolution_rejects_unknown_conflict() {
        let (session, _) = session(true);
        session.upload(bytes()).unwrap();
        session
            .set_resolution(ConflictType::ThemeNameExists, "t1", Resolution::CreateDuplicate)
            .unwrap();
        assert!(matches!(
            session.set_resolution(ConflictType::ThemeGroupNameExists, "t1", Resolution::Skip),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_failed_import_redetects_conflicts() {
        let (session, store) = session(false);
        session.upload(bytes()).unwrap();
        store
            .create_theme(&NewTheme::new("Courage", "#000").with_id("x1"))
            .unwrap();

        let err = session.execute().unwrap_err();
        assert_eq!(err.code(), "MISSING_RESOLUTION");
        assert_eq!(session.state(), SessionState::Preview);
        assert_eq!(session.preview().unwrap().summary.conflicts_count, 1);
        let resolutions = session.resolutions();
        assert_eq!(resolutions.len(), 1);
        assert_eq!(resolutions[0].resolution, Resolution::ReuseExisting);
        assert_eq!(resolutions[0].existing_id.as_deref(), Some("x1"));

        session
            .set_resolution(ConflictType::ThemeNameExists, "t1", Resolution::CreateDuplicate)
            .unwrap();
        session.review_conflicts().unwrap();
        let result = session.execute().unwrap();
        assert_eq!(result.created_themes, 1);
        assert_eq!(session.state(), SessionState::Success);
        assert!(store.list_themes().unwrap().iter().any(|t| t.name == "Courage (copie)"));
    }

    #[test]
    fn test_refreshed_preview_keeps_chosen_resolutions() {
        let (session, store) = session(true);
        session.upload(bytes()).unwrap();
        session
            .set_resolution(ConflictType::ThemeNameExists, "t1", Resolution::Skip)
            .unwrap();

        let mut inner = session.lock();
        let preview = session.service.preview_import(&bytes()).unwrap();
        inner.adopt_preview(preview);
        assert_eq!(inner.resolutions[0].resolution, Resolution::Skip);
        drop(inner);
        assert_eq!(store.list_themes().unwrap().len(), 1);
    }

    #[test]
    fn test_reset_returns_to_upload() {
        let (session, _) = session(false);
        session.upload(bytes()).unwrap();
        session.execute().unwrap();
        assert!(session.upload(bytes()).is_err());

        session.reset().unwrap();
        assert_eq!(session.state(), SessionState::Upload);
        assert!(session.preview().is_none());
        assert!(session.result().is_none());
    }
}
