//! Collection point for accepted records.

use harvest_core::{Record, SiteKind};
use std::sync::{Mutex, PoisonError};
use tracing::warn;

#[derive(Debug, Default)]
struct Inner {
    records: Vec<Record>,
    finalized: bool,
}

/// Accumulates records from every page worker of a run.
///
/// `append` may be called from any number of workers at once. Once
/// [`Aggregator::finalize`] has taken the records, further appends are
/// refused.
#[derive(Debug)]
pub struct Aggregator {
    site: SiteKind,
    inner: Mutex<Inner>,
}

impl Aggregator {
    /// Create an empty aggregator for one run against `site`.
    #[must_use]
    pub fn new(site: SiteKind) -> Self {
        Self {
            site,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Add a record. Returns false if the aggregator was already finalized.
    pub fn append(&self, record: Record) -> bool {
        let mut inner = self.lock();
        if inner.finalized {
            warn!(site = %self.site, key = %record.key, "append after finalize refused");
            return false;
        }
        inner.records.push(record);
        true
    }

    /// Number of records collected so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().records.len()
    }

    /// Whether nothing was collected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().records.is_empty()
    }

    /// Freeze the collection and hand out the ordered result.
    ///
    /// A second call yields an empty result.
    pub fn finalize(&self) -> RunResult {
        let records = {
            let mut inner = self.lock();
            inner.finalized = true;
            std::mem::take(&mut inner.records)
        };
        RunResult::new(self.site, records)
    }
}

/// Frozen, ordered records of one run.
///
/// Sorted by page index, then by position on the page, so the export order
/// does not depend on which page finished first.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    site: SiteKind,
    records: Vec<Record>,
}

impl RunResult {
    /// Build a result, ordering the records by origin.
    #[must_use]
    pub fn new(site: SiteKind, mut records: Vec<Record>) -> Self {
        records.sort_by_key(|record| record.origin);
        Self { site, records }
    }

    /// Site the records came from.
    #[must_use]
    pub fn site(&self) -> SiteKind {
        self.site
    }

    /// Records in export order.
    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    /// Number of records.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether there is nothing to export.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}
