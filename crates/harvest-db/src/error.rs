//! Database error types.
//!
//! `DatabaseError` covers opening, migrating and querying the database.
//! `StoreError` is the narrower error the dedup store reports to the pipeline.

use thiserror::Error;

/// Database-specific errors.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// The database file or in-memory connection could not be opened.
    #[error("failed to open database: {0}")]
    Open(String),

    /// Applying the embedded schema failed.
    #[error("migration failed: {0}")]
    Migration(String),

    /// No run with this id exists in the history table.
    #[error("run '{id}' not found")]
    RunNotFound {
        /// Run id that was looked up
        id: String,
    },

    /// A stored column held a value this build cannot read back.
    #[error("decode error: {0}")]
    Decode(String),

    /// Query failure reported by `SQLx`.
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    /// Creating the database directory failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Dedup store read/write failures.
///
/// The pipeline never aborts on these: a failed read counts as "not seen",
/// a failed write only risks re-emitting the record on a later run.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Looking up a key failed.
    #[error("dedup lookup failed for key '{key}': {source}")]
    Read {
        /// Key being looked up
        key: String,
        /// Underlying error
        #[source]
        source: sqlx::Error,
    },

    /// Recording a key failed.
    #[error("dedup write failed for key '{key}': {source}")]
    Write {
        /// Key being recorded
        key: String,
        /// Underlying error
        #[source]
        source: sqlx::Error,
    },
}

/// Result type alias for database operations.
pub type Result<T> = std::result::Result<T, DatabaseError>;
