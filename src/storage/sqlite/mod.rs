//! `SQLite` content store.
//!
//! - [`connection`]: lock acquisition, pragmas, transaction wrapper
//! - [`metrics`]: per-operation metrics
//! - [`store`]: the [`SqliteContentStore`] itself

mod connection;
mod metrics;
mod store;

pub use connection::{acquire_lock, configure_connection, with_transaction};
pub use metrics::record_operation_metrics;
pub use store::SqliteContentStore;
