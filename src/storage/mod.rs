//! Storage layer abstraction.
//!
//! The import engine talks to a [`ContentStore`]; two backends are provided:
//! - [`SqliteContentStore`]: durable, constraint-enforcing `SQLite` storage
//! - [`MemoryContentStore`]: lock-protected in-process storage

// Allow significant_drop_tightening - dropping database connections slightly early
// provides no meaningful benefit.
#![allow(clippy::significant_drop_tightening)]

pub mod memory;
pub mod sqlite;
mod traits;

pub use memory::MemoryContentStore;
pub use sqlite::SqliteContentStore;
pub use traits::{ContentStore, StoreContents};
