//! Pipeline driver.
//!
//! Runs one harvest end to end: plan the page set, process every page
//! concurrently, wait for all of them, then export.
//!
//! ```text
//! Planning -> Fetching -> Aggregating -> Exporting -> Done
//!     |                                      |
//!     +-------------> Failed <---------------+
//! ```
//!
//! A page worker fetches its page, extracts candidates, validates them and
//! claims their keys in the dedup store. Only planning and export failures
//! end the run; everything else is logged and costs that page or record.
//!
//! Sites with asset markers also consult the dedup store per asset link: a
//! link saved by an earlier run is counted but not downloaded again, and
//! every attempt records its outcome.

use crate::context::RunContext;
use crate::error::{ExportError, Result, RunError};
use crate::exporter::{clean_dir, Exporter};
use crate::planner::{self, PageUrl};
use chrono::Utc;
use futures::stream::{FuturesUnordered, StreamExt};
use harvest_core::{Record, RecordBody, RunId, SiteKind};
use harvest_fetch::{download_asset, AssetOutcome, Fetcher};
use harvest_sites::{AssetLink, Extractor, PageContext};
use scraper::Html;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Where a run is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    /// Reading the page count from page 1 and building the page plan
    Planning,
    /// Page workers are running
    Fetching,
    /// All workers finished; freezing the result
    Aggregating,
    /// Writing the export file
    Exporting,
    /// Finished successfully
    Done,
    /// Planning or export failed
    Failed,
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Planning => "planning",
            Self::Fetching => "fetching",
            Self::Aggregating => "aggregating",
            Self::Exporting => "exporting",
            Self::Done => "done",
            Self::Failed => "failed",
        })
    }
}

/// Summary of a finished run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    /// Run identifier
    pub run_id: RunId,
    /// Site harvested
    pub site: SiteKind,
    /// Final state
    pub state: RunState,
    /// Pages in the plan
    pub pages_planned: u32,
    /// Pages fetched and extracted
    pub pages_processed: u32,
    /// Records written to the export
    pub records_exported: u64,
    /// Export file, absent when nothing was exported
    pub output: Option<PathBuf>,
    /// Whether the run was cancelled before all pages were fetched
    pub cancelled: bool,
}

/// How one page worker ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageOutcome {
    /// Cancelled before the page was fetched
    Skipped,
    /// The fetch failed; the page contributes nothing
    FetchFailed,
    /// The page redirected and the site treats that as the end of the listing
    Redirected,
    /// Fetched and extracted; this many records were accepted
    Processed(usize),
}

/// Drives runs against a fetcher.
pub struct PipelineDriver {
    fetcher: Arc<dyn Fetcher>,
}

impl PipelineDriver {
    /// Create a driver fetching through `fetcher`.
    #[must_use]
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    fn enter(context: &RunContext, state: RunState) {
        info!(run_id = %context.run_id, site = %context.site(), state = %state, "run state");
    }

    /// Execute one run.
    ///
    /// Records collected before a cancellation are still exported: their
    /// keys are already claimed in the dedup store.
    pub async fn run(&self, context: &RunContext) -> Result<RunReport> {
        let profile = &context.profile;
        let mut report = RunReport {
            run_id: context.run_id.clone(),
            site: context.site(),
            state: RunState::Planning,
            pages_planned: 0,
            pages_processed: 0,
            records_exported: 0,
            output: None,
            cancelled: false,
        };

        Self::enter(context, RunState::Planning);
        let plan = planner::plan(
            self.fetcher.as_ref(),
            &profile.template,
            profile.extractor.as_ref(),
            profile.count_policy,
            profile.max_pages,
        )
        .await
        .map_err(|source| {
            Self::enter(context, RunState::Failed);
            tracing::error!(run_id = %context.run_id, error = %source, "discovery failed");
            RunError::Discovery {
                source,
                pages_processed: 0,
            }
        })?;
        report.pages_planned = u32::try_from(plan.len()).unwrap_or(u32::MAX);

        if plan.is_empty() {
            info!(run_id = %context.run_id, "page plan is empty, nothing to do");
            return Ok(Self::finish(context, report));
        }

        if profile.spec.detail_pages && profile.clean_output {
            let dir = profile.output_dir.clone();
            if let Err(e) = blocking(dir.clone(), move || clean_dir(&dir)).await {
                warn!(error = %e, "could not clean download directory");
            }
        }

        Self::enter(context, RunState::Fetching);
        let scope = context.cancel.child_token();
        let limit = profile.max_concurrent_pages.map(|max| max.max(1));
        let mut workers = FuturesUnordered::new();

        for page in &plan {
            workers.push(self.process_page(context, &scope, page));

            // Respect concurrency limit
            if let Some(limit) = limit {
                while workers.len() >= limit {
                    if let Some(outcome) = workers.next().await {
                        Self::tally(&mut report, outcome);
                    }
                }
            }
        }

        while let Some(outcome) = workers.next().await {
            Self::tally(&mut report, outcome);
        }
        report.cancelled = context.cancel.is_cancelled();

        Self::enter(context, RunState::Aggregating);
        let result = context.aggregator.finalize();
        if result.is_empty() {
            info!(run_id = %context.run_id, "result set is empty, skipping export");
            return Ok(Self::finish(context, report));
        }

        Self::enter(context, RunState::Exporting);
        let exporter = Exporter::new(profile.delimiter());
        let dir = profile.output_dir.clone();
        let clean = profile.clean_output && !profile.spec.detail_pages;
        let records = u64::try_from(result.len()).unwrap_or(u64::MAX);

        let exported = blocking(dir.clone(), move || {
            if clean {
                clean_dir(&dir)?;
            }
            exporter.export(&result, &dir)
        })
        .await;

        match exported {
            Ok(path) => {
                report.records_exported = records;
                report.output = Some(path);
                Ok(Self::finish(context, report))
            }
            Err(source) => {
                Self::enter(context, RunState::Failed);
                tracing::error!(run_id = %context.run_id, error = %source, "export failed");
                Err(RunError::Export {
                    source,
                    pages_processed: report.pages_processed,
                })
            }
        }
    }

    fn finish(context: &RunContext, mut report: RunReport) -> RunReport {
        report.state = RunState::Done;
        Self::enter(context, RunState::Done);
        info!(
            run_id = %report.run_id,
            pages_planned = report.pages_planned,
            pages_processed = report.pages_processed,
            records = report.records_exported,
            cancelled = report.cancelled,
            "run finished"
        );
        report
    }

    fn tally(report: &mut RunReport, outcome: PageOutcome) {
        if let PageOutcome::Processed(_) = outcome {
            report.pages_processed += 1;
        }
    }

    async fn process_page(
        &self,
        context: &RunContext,
        scope: &CancellationToken,
        page: &PageUrl,
    ) -> PageOutcome {
        if scope.is_cancelled() {
            return PageOutcome::Skipped;
        }

        let fetched = tokio::select! {
            biased;
            () = scope.cancelled() => return PageOutcome::Skipped,
            fetched = self.fetcher.fetch(page.url()) => fetched,
        };
        let fetched = match fetched {
            Ok(fetched) => fetched,
            Err(e) => {
                warn!(url = %page.url(), error = %e, "page fetch failed");
                return PageOutcome::FetchFailed;
            }
        };

        if context.profile.spec.stop_on_redirect && fetched.was_redirected() {
            info!(
                url = %page.url(),
                final_url = %fetched.final_url,
                "page redirected, stopping further page fetches"
            );
            scope.cancel();
            return PageOutcome::Redirected;
        }

        let page_context = PageContext {
            url: page.url().to_string(),
            page: page.index(),
            fetched_at: Utc::now(),
        };
        let candidates =
            extract_records(context.profile.extractor.as_ref(), &page_context, &fetched.body);

        let mut accepted = Vec::new();
        for record in candidates {
            if self.accept(context, &record).await {
                accepted.push(record);
            }
        }

        if context.profile.spec.detail_pages {
            accepted = self.fetch_details(context, scope, accepted).await;
        }

        let count = accepted.len();
        for record in accepted {
            context.aggregator.append(record);
        }

        debug!(url = %page.url(), accepted = count, "page processed");
        PageOutcome::Processed(count)
    }

    /// Validate a candidate and claim its key.
    async fn accept(&self, context: &RunContext, record: &Record) -> bool {
        if !context.validator.is_valid(record) {
            return false;
        }

        let site = record.site;
        match context.dedup.seen(site, &record.key).await {
            Ok(true) => {
                debug!(key = %record.key, "already exported by an earlier run");
                return false;
            }
            Ok(false) => {}
            Err(e) => warn!(key = %record.key, error = %e, "dedup lookup failed, treating as new"),
        }

        match context.dedup.mark_seen(site, &record.key).await {
            Ok(true) => true,
            Ok(false) => {
                debug!(key = %record.key, "claimed concurrently by another worker");
                false
            }
            Err(e) => {
                warn!(key = %record.key, error = %e, "failed to record dedup key");
                true
            }
        }
    }

    /// Fetch the detail page of every record and download its assets.
    async fn fetch_details(
        &self,
        context: &RunContext,
        scope: &CancellationToken,
        records: Vec<Record>,
    ) -> Vec<Record> {
        let mut details: FuturesUnordered<_> = records
            .into_iter()
            .map(|record| self.fetch_detail(context, scope, record))
            .collect();

        let mut done = Vec::new();
        while let Some(record) = details.next().await {
            done.push(record);
        }
        done
    }

    async fn fetch_detail(
        &self,
        context: &RunContext,
        scope: &CancellationToken,
        record: Record,
    ) -> Record {
        let directory = match &record.body {
            RecordBody::Gallery { directory, .. } | RecordBody::Album { directory, .. } => {
                directory.clone()
            }
            RecordBody::Forum { .. } | RecordBody::Rental { .. } => return record,
        };

        if scope.is_cancelled() {
            debug!(url = %record.href, "cancelled, detail page not fetched");
            return record;
        }
        let fetched = tokio::select! {
            biased;
            () = scope.cancelled() => {
                debug!(url = %record.href, "cancelled, detail page not fetched");
                return record;
            }
            fetched = self.fetcher.fetch(&record.href) => fetched,
        };
        let page = match fetched {
            Ok(page) => page,
            Err(e) => {
                warn!(url = %record.href, error = %e, "detail page fetch failed");
                return record;
            }
        };

        let page_context = PageContext {
            url: page.final_url.clone(),
            page: record.origin.page,
            fetched_at: Utc::now(),
        };
        let links = extract_assets(context.profile.extractor.as_ref(), &page_context, &page.body);
        let target = context.profile.output_dir.join(&directory);

        let mut images = 0;
        let mut failed = 0;
        for link in links {
            let Some(link) = link else {
                failed += 1;
                continue;
            };
            if scope.is_cancelled() {
                failed += 1;
                continue;
            }
            if self.download(context, &target, &link).await {
                images += 1;
            } else {
                failed += 1;
            }
        }

        debug!(url = %record.href, images, failed, "detail page processed");
        let body = match &record.body {
            RecordBody::Album { clicks, .. } => RecordBody::Album {
                clicks: *clicks,
                directory,
                images,
                failed,
            },
            _ => RecordBody::Gallery {
                directory,
                images,
                failed,
            },
        };
        record.with_body(body)
    }

    /// Download one asset; `true` when it is on disk afterwards.
    async fn download(&self, context: &RunContext, dir: &Path, link: &AssetLink) -> bool {
        let site = context.site();
        let markers = context.profile.spec.asset_markers;

        if markers {
            match context.dedup.asset_downloaded(site, &link.src).await {
                Ok(true) => {
                    debug!(url = %link.src, "asset saved by an earlier run");
                    return true;
                }
                Ok(false) => {}
                Err(e) => warn!(url = %link.src, error = %e, "asset marker lookup failed"),
            }
        }

        let path = harvest_fetch::assets::asset_path(dir, &link.name, &link.suffix);
        let saved = match download_asset(self.fetcher.as_ref(), &link.src, &path).await {
            Ok(AssetOutcome::Saved | AssetOutcome::Skipped) => true,
            Err(e) => {
                warn!(url = %link.src, error = %e, "asset download failed");
                false
            }
        };

        if markers {
            if let Err(e) = context.dedup.mark_asset(site, &link.src, saved).await {
                warn!(url = %link.src, error = %e, "failed to record asset marker");
            }
        }
        saved
    }
}

impl fmt::Debug for PipelineDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineDriver").finish_non_exhaustive()
    }
}

/// Extract a listing body and keep the well-formed candidates.
fn extract_records(extractor: &dyn Extractor, context: &PageContext, body: &str) -> Vec<Record> {
    extractor
        .extract(context, body)
        .into_iter()
        .filter_map(|candidate| match candidate {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(url = %context.url, error = %e, "skipping malformed listing");
                None
            }
        })
        .collect()
}

/// Parse a detail page; `None` marks a link that could not be read.
fn extract_assets(
    extractor: &dyn Extractor,
    context: &PageContext,
    body: &str,
) -> Vec<Option<AssetLink>> {
    let document = Html::parse_document(body);
    extractor
        .detail_assets(context, &document)
        .into_iter()
        .map(|asset| match asset {
            Ok(asset) => Some(asset),
            Err(e) => {
                warn!(url = %context.url, error = %e, "skipping unreadable asset link");
                None
            }
        })
        .collect()
}

/// Run blocking file work off the async workers.
async fn blocking<T, F>(dir: PathBuf, work: F) -> std::result::Result<T, ExportError>
where
    F: FnOnce() -> std::result::Result<T, ExportError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| ExportError::Write {
            path: dir,
            source: std::io::Error::other(e),
        })?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_names() {
        assert_eq!(RunState::Planning.to_string(), "planning");
        assert_eq!(RunState::Failed.to_string(), "failed");
    }

    #[test]
    fn test_tally_counts_processed_pages_only() {
        let mut report = RunReport {
            run_id: RunId::generate(),
            site: SiteKind::Tc,
            state: RunState::Fetching,
            pages_planned: 4,
            pages_processed: 0,
            records_exported: 0,
            output: None,
            cancelled: false,
        };

        for outcome in [
            PageOutcome::Processed(3),
            PageOutcome::Processed(0),
            PageOutcome::FetchFailed,
            PageOutcome::Redirected,
            PageOutcome::Skipped,
        ] {
            PipelineDriver::tally(&mut report, outcome);
        }
        assert_eq!(report.pages_processed, 2);
    }
}
