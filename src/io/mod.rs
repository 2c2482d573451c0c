//! Snapshot export and import.
//!
//! # Architecture
//!
//! - [`snapshot`] and [`codec`] define and (de)serialize the portable format
//! - [`validation`] checks a decoded snapshot for structural defects
//! - [`conflicts`] compares snapshot names with the live store
//! - [`plan`] turns caller resolutions into a remapping plan
//! - [`services`] export selections, execute imports, and drive sessions
//!
//! Decoding, conflict detection, and planning are pure and never touch the
//! store. Only [`ImportService`] writes.
//!
//! # Examples
//!
//! ```rust,ignore
//! use themeport::io::{ConflictType, ImportService, Resolution, ResolutionEntry};
//!
//! let preview = service.preview_import(&bytes)?;
//! let resolutions: Vec<_> = preview
//!     .conflicts
//!     .iter()
//!     .map(|c| ResolutionEntry::for_conflict(c, Resolution::CreateDuplicate))
//!     .collect();
//! let result = service.execute_import(&bytes, &resolutions)?;
//! println!("Created {} themes", result.created_themes);
//! ```

pub mod codec;
pub mod conflicts;
pub mod plan;
pub mod services;
pub mod snapshot;
pub mod validation;

// Re-exports for convenience
pub use conflicts::{Conflict, ConflictItem, ConflictType, NameIndex};
pub use plan::{Outcome, RemappingPlan, Resolution, ResolutionEntry, Resolutions};
pub use services::export::{ExportBundle, ExportService, Selection};
pub use services::import::{
    ImportError, ImportPreview, ImportProgress, ImportResult, ImportService, PreviewSummary,
};
pub use services::session::{ImportSession, SessionState};
pub use snapshot::{ExportKind, Snapshot, SnapshotMetadata};
pub use validation::{SnapshotValidator, ValidationIssue};
