//! Storage for identity keys of records already exported.
//!
//! Keys are namespaced by site. Each function is a single statement, so each
//! runs in its own short implicit transaction.

use chrono::Utc;
use sqlx::SqlitePool;

/// Whether `key` has been recorded for `site`.
pub async fn is_seen(pool: &SqlitePool, site: &str, key: &str) -> Result<bool, sqlx::Error> {
    let row: Option<(i64,)> = sqlx::query_as(
        r"
        SELECT 1
        FROM seen_keys
        WHERE site = ? AND key = ?
        ",
    )
    .bind(site)
    .bind(key)
    .fetch_optional(pool)
    .await?;

    Ok(row.is_some())
}

/// Record `key` for `site`.
///
/// Returns `true` when this call inserted the key and `false` when it was
/// already present, which makes the insert a per-key claim.
pub async fn mark_seen(pool: &SqlitePool, site: &str, key: &str) -> Result<bool, sqlx::Error> {
    let result = sqlx::query(
        r"
        INSERT OR IGNORE INTO seen_keys (site, key, first_seen_at)
        VALUES (?, ?, ?)
        ",
    )
    .bind(site)
    .bind(key)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Drop every key recorded for `site`, returning how many were removed.
pub async fn forget_site(pool: &SqlitePool, site: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM seen_keys WHERE site = ?")
        .bind(site)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
