//! Export, import, and session services.
//!
//! Orchestrates the codec, conflict detection, planning, and storage.

pub mod export;
pub mod import;
pub mod session;

pub use export::{ExportBundle, ExportService, Selection};
pub use import::{
    ImportError, ImportPreview, ImportProgress, ImportResult, ImportService, PreviewSummary,
    ProgressCallback,
};
pub use session::{ImportSession, SessionState};
