//! Database connection management.
//!
//! Builds `SQLx` SQLite pools for a database file or a private in-memory
//! database.

use crate::error::{DatabaseError, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Maximum pooled connections for a file database.
const MAX_CONNECTIONS: u32 = 5;

/// How long a writer waits on a locked database before giving up.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open (creating if needed) a pool over a database file.
///
/// The parent directory is created when missing. The database runs in WAL
/// mode so that page workers can read while another one writes.
///
/// # Errors
/// Returns `DatabaseError` if the directory cannot be created or the
/// database cannot be opened.
pub async fn open_pool(path: impl AsRef<Path>) -> Result<SqlitePool> {
    let path = path.as_ref();

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let connect_options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(BUSY_TIMEOUT);

    let pool = SqlitePoolOptions::new()
        .max_connections(MAX_CONNECTIONS)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("{}: {e}", path.display())))?;

    tracing::info!("Database pool created at {}", path.display());

    Ok(pool)
}

/// Open a pool over a fresh in-memory database.
///
/// The pool holds a single connection that is never recycled, so the data
/// lives exactly as long as the pool.
pub async fn open_memory_pool() -> Result<SqlitePool> {
    let connect_options = SqliteConnectOptions::from_str("sqlite::memory:")
        .map_err(|e| DatabaseError::Open(format!("invalid connection string: {e}")))?;

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .min_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(connect_options)
        .await
        .map_err(|e| DatabaseError::Open(format!("in-memory database: {e}")))?;

    Ok(pool)
}
