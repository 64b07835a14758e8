//! Schema migrations.
//!
//! `migrations/0001_seen_keys.sql` creates the dedup table,
//! `0002_runs.sql` the run history and `0003_asset_markers.sql` the per-link
//! download markers. All are embedded at compile time with `sqlx::migrate!`.

use crate::error::{DatabaseError, Result};
use sqlx::SqlitePool;

/// Bring the schema up to date. Safe to call on every start.
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    tracing::debug!("Applying schema migrations");

    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .map_err(|e| DatabaseError::Migration(e.to_string()))?;

    tracing::debug!("Schema is current");
    Ok(())
}

/// Highest applied migration, or 0 for a database never migrated.
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i64> {
    let table_exists = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM sqlite_master WHERE type='table' AND name='_sqlx_migrations'",
    )
    .fetch_one(pool)
    .await?
        > 0;

    if !table_exists {
        return Ok(0);
    }

    let version =
        sqlx::query_scalar::<_, i64>("SELECT COALESCE(MAX(version), 0) FROM _sqlx_migrations")
            .fetch_optional(pool)
            .await?
            .unwrap_or(0);

    Ok(version)
}
