//! Shared connection handling for the `SQLite` store.
//!
//! Mutex handling with poison recovery, connection pragmas, and the
//! transaction wrapper every write goes through.

use crate::{Error, Result};
use rusqlite::Connection;
use std::sync::{Mutex, MutexGuard};

/// Helper to acquire mutex lock with poison recovery.
///
/// If the mutex is poisoned (due to a panic in a previous critical section),
/// we recover the inner value and log a warning.
pub fn acquire_lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => {
            tracing::warn!("SQLite mutex was poisoned, recovering");
            metrics::counter!("sqlite_mutex_poison_recovery_total").increment(1);
            poisoned.into_inner()
        },
    }
}

/// Configures a `SQLite` connection.
///
/// # Configuration Applied
///
/// - **WAL mode**: concurrent readers alongside a single writer, so exports
///   do not block imports
/// - **NORMAL synchronous**: balances durability with performance
/// - **`busy_timeout`**: waits up to 5 seconds for locks held by other processes
/// - **`foreign_keys`**: extract and membership references must resolve
///
/// # Errors
///
/// Returns [`Error::OperationFailed`] if foreign key enforcement cannot be enabled.
pub fn configure_connection(conn: &Connection) -> Result<()> {
    // journal_mode returns a row ("wal" or "memory"), so failures are ignored
    let _ = conn.pragma_update(None, "journal_mode", "WAL");
    let _ = conn.pragma_update(None, "synchronous", "NORMAL");
    let _ = conn.pragma_update(None, "busy_timeout", "5000");

    conn.pragma_update(None, "foreign_keys", "ON")
        .map_err(|e| Error::OperationFailed {
            operation: "enable_foreign_keys".to_string(),
            cause: e.to_string(),
        })?;

    Ok(())
}

/// Runs `f` inside a transaction, committing on `Ok` and rolling back on `Err`.
///
/// Writes use `BEGIN IMMEDIATE` so the write lock is taken before any check
/// runs; reads use a deferred transaction for a consistent view.
pub fn with_transaction<T>(
    conn: &Connection,
    immediate: bool,
    f: impl FnOnce(&Connection) -> Result<T>,
) -> Result<T> {
    let begin = if immediate { "BEGIN IMMEDIATE" } else { "BEGIN DEFERRED" };
    conn.execute(begin, []).map_err(|e| Error::OperationFailed {
        operation: "begin_transaction".to_string(),
        cause: e.to_string(),
    })?;

    let result = f(conn);

    if result.is_ok() {
        conn.execute("COMMIT", []).map_err(|e| Error::OperationFailed {
            operation: "commit_transaction".to_string(),
            cause: e.to_string(),
        })?;
    } else {
        let _ = conn.execute("ROLLBACK", []);
    }

    result
}
