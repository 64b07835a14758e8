//! Per-link download markers for image assets.
//!
//! Every attempted download leaves one row holding whether it succeeded. A
//! link marked as downloaded is not fetched again; a failed one is retried
//! and its marker overwritten with the new outcome.

use chrono::Utc;
use sqlx::SqlitePool;

/// Whether `link` was downloaded successfully for `site`.
pub async fn is_downloaded(pool: &SqlitePool, site: &str, link: &str) -> Result<bool, sqlx::Error> {
    let downloaded: Option<bool> = sqlx::query_scalar(
        r"
        SELECT downloaded
        FROM asset_markers
        WHERE site = ? AND link = ?
        ",
    )
    .bind(site)
    .bind(link)
    .fetch_optional(pool)
    .await?;

    Ok(downloaded.unwrap_or(false))
}

/// Store the outcome of downloading `link`, replacing any earlier marker.
pub async fn record(
    pool: &SqlitePool,
    site: &str,
    link: &str,
    downloaded: bool,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r"
        INSERT INTO asset_markers (site, link, downloaded, recorded_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT (site, link) DO UPDATE
        SET downloaded = excluded.downloaded, recorded_at = excluded.recorded_at
        ",
    )
    .bind(site)
    .bind(link)
    .bind(downloaded)
    .bind(Utc::now().to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Drop every marker of `site`, returning how many were removed.
pub async fn forget_site(pool: &SqlitePool, site: &str) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM asset_markers WHERE site = ?")
        .bind(site)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}
