//! # Themeport
//!
//! Export and import engine for a three-level content graph:
//! theme groups contain themes, and extracts point at a theme.
//!
//! A selection of the graph is serialized into a portable, versioned
//! snapshot that keeps every entity's original ID. Re-importing a snapshot
//! detects name collisions against the target store, applies the caller's
//! resolution for each collision, and writes entities in dependency order
//! without ever leaving a dangling reference behind.
//!
//! ## Pipeline
//!
//! ```text
//! ExportService -> codec::encode -> (file) -> codec::decode
//!     -> conflicts::detect -> plan::build_plan -> ImportService::execute
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use themeport::io::{ExportService, ImportService, Selection};
//! use themeport::storage::MemoryContentStore;
//!
//! let store = Arc::new(MemoryContentStore::new());
//! let export = ExportService::new(store.clone()).export_selection(&Selection::All)?;
//! let preview = ImportService::new(store).preview_import(&export.data)?;
//! println!("{} conflicts", preview.summary.conflicts_count);
//! ```

#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![warn(clippy::nursery)]
#![warn(missing_docs)]
#![forbid(unsafe_code)]
#![allow(clippy::multiple_crate_versions)]

use thiserror::Error as ThisError;

pub mod config;
pub mod io;
pub mod models;
pub mod observability;
pub mod storage;

pub use config::PorterConfig;
pub use io::{
    ConflictType, ExportBundle, ExportService, ImportPreview, ImportResult, ImportService,
    ImportSession, Resolution, ResolutionEntry, SessionState, Snapshot,
};
pub use models::{EntityKind, Extract, ExtractId, Theme, ThemeGroup, ThemeGroupId, ThemeId};
pub use storage::{ContentStore, MemoryContentStore, SqliteContentStore};

/// Error type for themeport operations.
///
/// # Error Variant Triggers
///
/// | Variant | Code | Raised When |
/// |---------|------|-------------|
/// | `InvalidInput` | `INVALID_INPUT` | Empty selection, unknown kind or resolution name |
/// | `OperationFailed` | `OPERATION_FAILED` | SQLite or filesystem errors |
/// | `MalformedSnapshot` | `MALFORMED_SNAPSHOT` | Snapshot bytes cannot be parsed |
/// | `UnsupportedVersion` | `UNSUPPORTED_VERSION` | `formatVersion` is not understood |
/// | `DanglingReference` | `DANGLING_REFERENCE` | A snapshot reference points outside the snapshot |
/// | `MissingResolution` | `MISSING_RESOLUTION` | A detected conflict has no caller decision |
/// | `NameConflict` | `NAME_CONFLICT` | The store already holds an entity with that name |
/// | `NotFound` | `NOT_FOUND` | An ID does not resolve to a live entity |
/// | `InvalidTransition` | `INVALID_TRANSITION` | Session action not allowed in its current state |
#[derive(Debug, ThisError)]
pub enum Error {
    /// Invalid input was provided by the caller.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// An operation failed.
    ///
    /// Raised when:
    /// - `SQLite` statements or transactions fail
    /// - Filesystem I/O errors occur while reading or writing snapshots
    /// - Logging cannot be initialized
    #[error("operation '{operation}' failed: {cause}")]
    OperationFailed {
        /// The operation that failed.
        operation: String,
        /// The underlying cause.
        cause: String,
    },

    /// The snapshot could not be parsed or is structurally invalid.
    #[error("malformed snapshot: {0}")]
    MalformedSnapshot(String),

    /// The snapshot was written with a format version this build cannot read.
    #[error("unsupported snapshot version '{found}' (supported: {supported})")]
    UnsupportedVersion {
        /// Version found in the snapshot.
        found: String,
        /// Comma-separated list of supported versions.
        supported: String,
    },

    /// A reference inside the snapshot does not resolve within the snapshot.
    #[error("{entity} '{original_id}' references missing theme '{missing}'")]
    DanglingReference {
        /// Kind of the referencing entity.
        entity: models::EntityKind,
        /// Original ID of the referencing entity.
        original_id: String,
        /// Original ID that could not be resolved.
        missing: String,
    },

    /// A detected conflict was not given a resolution by the caller.
    #[error("no resolution supplied for {conflict_type} conflict on '{original_id}'")]
    MissingResolution {
        /// Type of the unresolved conflict.
        conflict_type: io::ConflictType,
        /// Original ID of the conflicting snapshot item.
        original_id: String,
    },

    /// The store rejected a write because the name is already taken.
    #[error("a {kind} named '{name}' already exists")]
    NameConflict {
        /// Kind of entity being created.
        kind: models::EntityKind,
        /// The colliding name.
        name: String,
    },

    /// An entity could not be found.
    #[error("{kind} '{id}' not found")]
    NotFound {
        /// Kind of entity looked up.
        kind: models::EntityKind,
        /// The ID that was looked up.
        id: String,
    },

    /// A session action was attempted from a state that does not allow it.
    #[error("cannot {action} while session is in state {state}")]
    InvalidTransition {
        /// Current session state.
        state: String,
        /// The rejected action.
        action: String,
    },
}

impl Error {
    /// Returns the stable machine-readable code for this error.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::OperationFailed { .. } => "OPERATION_FAILED",
            Self::MalformedSnapshot(_) => "MALFORMED_SNAPSHOT",
            Self::UnsupportedVersion { .. } => "UNSUPPORTED_VERSION",
            Self::DanglingReference { .. } => "DANGLING_REFERENCE",
            Self::MissingResolution { .. } => "MISSING_RESOLUTION",
            Self::NameConflict { .. } => "NAME_CONFLICT",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
        }
    }

    /// Returns whether this error was raised while decoding a snapshot.
    #[must_use]
    pub const fn is_structural(&self) -> bool {
        matches!(
            self,
            Self::MalformedSnapshot(_) | Self::UnsupportedVersion { .. } | Self::DanglingReference { .. }
        )
    }
}

/// Result type alias for themeport operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::InvalidInput("test error".to_string());
        assert_eq!(err.to_string(), "invalid input: test error");

        let err = Error::OperationFailed {
            operation: "test".to_string(),
            cause: "failed".to_string(),
        };
        assert_eq!(err.to_string(), "operation 'test' failed: failed");

        let err = Error::NameConflict {
            kind: models::EntityKind::Theme,
            name: "Courage".to_string(),
        };
        assert_eq!(err.to_string(), "a theme named 'Courage' already exists");
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(
            Error::MalformedSnapshot("eof".to_string()).code(),
            "MALFORMED_SNAPSHOT"
        );
        assert_eq!(
            Error::UnsupportedVersion {
                found: "9.0".to_string(),
                supported: "1.0".to_string(),
            }
            .code(),
            "UNSUPPORTED_VERSION"
        );
        let dangling = Error::DanglingReference {
            entity: models::EntityKind::Extract,
            original_id: "e1".to_string(),
            missing: "t9".to_string(),
        };
        assert_eq!(dangling.code(), "DANGLING_REFERENCE");
        assert!(dangling.is_structural());
        assert!(!Error::InvalidInput(String::new()).is_structural());
    }
}
