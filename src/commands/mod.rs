//! Command handlers module.
//!
//! - `io.rs`: export, preview, and import commands

mod io;

use std::sync::Arc;

use themeport::config::PorterConfig;
use themeport::storage::{ContentStore, MemoryContentStore, SqliteContentStore};
use themeport::Result;

pub use io::{cmd_export, cmd_import, cmd_preview};

/// Opens the content store selected by the global flags.
pub fn open_store(config: &PorterConfig, in_memory: bool) -> Result<Arc<dyn ContentStore>> {
    if in_memory {
        tracing::debug!("Using in-memory content store");
        return Ok(Arc::new(MemoryContentStore::new()));
    }
    let path = config.database_path();
    tracing::debug!(path = %path.display(), "Opening content store");
    Ok(Arc::new(SqliteContentStore::new(path)?))
}
