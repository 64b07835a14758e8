//! `harvest history`: recent runs.

use crate::state::AppState;
use harvest_core::SiteKind;
use harvest_db::{runs, RunRecord};

/// Most recent runs first.
pub async fn execute(
    state: &AppState,
    site: Option<SiteKind>,
    limit: u32,
) -> anyhow::Result<Vec<RunRecord>> {
    let db = state.open_database().await?;
    let records = runs::list_recent(db.pool(), site.as_ref().map(SiteKind::as_str), limit).await?;
    db.close().await;
    Ok(records)
}

/// Render one run as a table line.
#[must_use]
pub fn format_run(run: &RunRecord) -> String {
    let status = run.status.to_string();
    let mut line = format!(
        "{}  {:<4}  {status:<10}  pages {}/{}  records {}",
        run.started_at.format("%Y-%m-%d %H:%M:%S"),
        run.site,
        run.pages_processed,
        run.pages_planned,
        run.records_exported,
    );
    if let Some(path) = &run.output_path {
        line.push_str("  ");
        line.push_str(path);
    }
    if let Some(message) = &run.error_message {
        line.push_str("  error: ");
        line.push_str(message);
    }
    line
}
