//! `harvest run`: one pipeline run with history bookkeeping.

use crate::state::AppState;
use anyhow::Context;
use chrono::Utc;
use harvest_core::SiteKind;
use harvest_db::{runs, DedupStore, MemoryDedupStore, RunOutcome, RunStatus, SqliteDedupStore};
use harvest_fetch::{Fetcher, HttpFetcher};
use harvest_pipeline::{PipelineDriver, RunContext, RunReport};
use harvest_sites::SiteProfile;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Options of one run.
#[derive(Debug, Clone)]
pub struct RunRequest {
    /// Site to harvest
    pub site: SiteKind,
    /// Page template overriding the configured one
    pub url: Option<String>,
    /// Use a throwaway dedup store and skip run history
    pub dry_run: bool,
}

/// Run the pipeline over HTTP until done or interrupted with Ctrl-C.
pub async fn handle(state: &AppState, request: &RunRequest) -> anyhow::Result<RunReport> {
    let fetcher = HttpFetcher::new(&state.config.http).context("failed to build HTTP client")?;

    let cancel = CancellationToken::new();
    let on_interrupt = cancel.clone();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, finishing in-flight pages");
            on_interrupt.cancel();
        }
    });

    let result = execute(state, request, Arc::new(fetcher), cancel).await;
    watcher.abort();
    result
}

/// Run the pipeline with an explicit fetcher and cancellation token.
pub async fn execute(
    state: &AppState,
    request: &RunRequest,
    fetcher: Arc<dyn Fetcher>,
    cancel: CancellationToken,
) -> anyhow::Result<RunReport> {
    let profile =
        SiteProfile::from_config_with_template(&state.config, request.site, request.url.as_deref())?;

    let driver = PipelineDriver::new(fetcher);

    if request.dry_run {
        info!(site = %request.site, "Dry run: dedup keys will not be persisted");
        let context = RunContext::new(profile, Arc::new(MemoryDedupStore::new()), cancel);
        return Ok(driver.run(&context).await?);
    }

    let db = state.open_database().await?;
    let store: Arc<dyn DedupStore> = Arc::new(SqliteDedupStore::new(db.pool().clone()));
    let context = RunContext::new(profile, store, cancel);
    let run_id = context.run_id.to_string();

    runs::create_run(db.pool(), &run_id, request.site.as_str(), Utc::now())
        .await
        .context("failed to record run start")?;

    let result = driver.run(&context).await;

    match &result {
        Ok(report) => {
            let status = if report.cancelled {
                RunStatus::Cancelled
            } else {
                RunStatus::Completed
            };
            let outcome = RunOutcome {
                pages_planned: report.pages_planned,
                pages_processed: report.pages_processed,
                records_exported: report.records_exported,
                output_path: report.output.as_ref().map(|p| p.display().to_string()),
            };
            runs::finish_run(db.pool(), &run_id, status, &outcome)
                .await
                .context("failed to record run completion")?;
        }
        Err(e) => {
            if let Err(db_err) =
                runs::fail_run(db.pool(), &run_id, e.pages_processed(), &e.to_string()).await
            {
                warn!("Failed to record run failure: {}", db_err);
            }
        }
    }

    db.close().await;
    Ok(result?)
}

/// One-line summary printed after a run.
#[must_use]
pub fn summary(report: &RunReport) -> String {
    let mut line = match &report.output {
        Some(path) => format!(
            "{}: exported {} records from {}/{} pages to {}",
            report.site,
            report.records_exported,
            report.pages_processed,
            report.pages_planned,
            path.display()
        ),
        None => format!(
            "{}: nothing new to export ({}/{} pages processed)",
            report.site, report.pages_processed, report.pages_planned
        ),
    };
    if report.cancelled {
        line.push_str(" [cancelled]");
    }
    line
}
