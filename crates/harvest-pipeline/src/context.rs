//! Per-run state shared by every page worker.

use crate::aggregator::Aggregator;
use crate::validator::{FilterPolicy, Validator};
use chrono::{DateTime, Utc};
use harvest_core::{RunId, SiteKind};
use harvest_db::DedupStore;
use harvest_sites::SiteProfile;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Everything one pipeline run reads or mutates.
///
/// A context is built for a single run and dropped with it. Nothing in here
/// is process-wide, so two runs never see each other's authors or records.
pub struct RunContext {
    /// Identifier of this run
    pub run_id: RunId,
    /// Site being harvested
    pub profile: SiteProfile,
    /// Filter with this run's seen-authors set
    pub validator: Validator,
    /// Cross-run dedup store
    pub dedup: Arc<dyn DedupStore>,
    /// Accepted records
    pub aggregator: Aggregator,
    /// Run scope; cancelling it stops new fetches
    pub cancel: CancellationToken,
    /// Instant recency is judged against
    pub reference: DateTime<Utc>,
}

impl RunContext {
    /// Build the context for a run starting now.
    #[must_use]
    pub fn new(
        profile: SiteProfile,
        dedup: Arc<dyn DedupStore>,
        cancel: CancellationToken,
    ) -> Self {
        Self::with_reference(profile, dedup, cancel, Utc::now())
    }

    /// Build the context with an explicit reference instant.
    #[must_use]
    pub fn with_reference(
        profile: SiteProfile,
        dedup: Arc<dyn DedupStore>,
        cancel: CancellationToken,
        reference: DateTime<Utc>,
    ) -> Self {
        let validator = Validator::new(FilterPolicy::from_profile(&profile), reference);
        Self {
            run_id: RunId::generate(),
            aggregator: Aggregator::new(profile.kind()),
            profile,
            validator,
            dedup,
            cancel,
            reference,
        }
    }

    /// Site kind of this run.
    #[must_use]
    pub fn site(&self) -> SiteKind {
        self.profile.kind()
    }
}

impl std::fmt::Debug for RunContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunContext")
            .field("run_id", &self.run_id)
            .field("profile", &self.profile)
            .field("validator", &self.validator)
            .field("aggregator", &self.aggregator)
            .field("cancelled", &self.cancel.is_cancelled())
            .field("reference", &self.reference)
            .finish_non_exhaustive()
    }
}
