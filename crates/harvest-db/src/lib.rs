//! Harvest Database Layer
//!
//! Provides `SQLite` persistence for the harvest pipeline using `SQLx` with
//! embedded migrations.
//!
//! # Architecture
//!
//! - **Dedup keys**: `seen_keys` holds the identity of every record already
//!   exported, namespaced by site, and survives across runs
//! - **Asset markers**: `asset_markers` holds the download outcome of every
//!   asset link, so a saved image is never fetched twice
//! - **Run history**: `runs` keeps one row per pipeline execution
//! - **Migrations**: SQL migrations are embedded and versioned using `SQLx`
//! - **Connection Pooling**: WAL-mode pool for files, a pinned single
//!   connection for in-memory databases
//!
//! # Example
//!
//! ```ignore
//! use harvest_db::Database;
//!
//! let db = Database::new("harvest.db").await?;
//! db.run_migrations().await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod asset_markers;
pub mod connection;
pub mod dedup;
pub mod error;
pub mod migrations;
/// Run history bookkeeping.
pub mod runs;
pub mod seen_keys;

// Re-export commonly used types
pub use dedup::{DedupStore, MemoryDedupStore, SqliteDedupStore};
pub use error::{DatabaseError, Result, StoreError};
pub use runs::{RunOutcome, RunRecord, RunStatus};

use sqlx::SqlitePool;
use std::path::Path;

/// High-level database handle with migrations.
///
/// Cloning is cheap: clones share the same pool.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (creating if needed) the database file at `path`.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the database cannot be opened.
    pub async fn new(path: impl AsRef<Path>) -> Result<Self> {
        let pool = connection::open_pool(path).await?;
        Ok(Self { pool })
    }

    /// Open a private in-memory database, mostly for tests and dry runs.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the connection cannot be established.
    pub async fn in_memory() -> Result<Self> {
        let pool = connection::open_memory_pool().await?;
        Ok(Self { pool })
    }

    /// Wrap an existing pool.
    #[must_use]
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Run all pending database migrations.
    ///
    /// # Errors
    /// Returns `DatabaseError::Migration` if any migration fails.
    pub async fn run_migrations(&self) -> Result<()> {
        migrations::run_migrations(&self.pool).await
    }

    /// Get the current schema version.
    ///
    /// # Errors
    /// Returns `DatabaseError` if the version cannot be queried.
    pub async fn get_schema_version(&self) -> Result<i64> {
        migrations::get_schema_version(&self.pool).await
    }

    /// Get a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection gracefully.
    pub async fn close(self) {
        self.pool.close().await;
    }
}
