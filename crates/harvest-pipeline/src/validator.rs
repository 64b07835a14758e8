//! Record filtering.
//!
//! Checks run in a fixed order and stop at the first failure:
//! ban lists, per-run author uniqueness, click threshold, recency, then
//! the category allow-list. A rejection is never an error; the record is
//! dropped.

use chrono::{DateTime, TimeDelta, Utc};
use harvest_core::{Record, RecordBody};
use harvest_sites::SiteProfile;
use std::collections::HashSet;
use std::fmt;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

/// Filter settings for one run, fixed at run start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FilterPolicy {
    /// Substrings that ban a record's title, category or labels
    pub banned_titles: Vec<String>,
    /// Authors banned by exact match
    pub banned_authors: HashSet<String>,
    /// When non-empty, only these categories pass
    pub allowed_categories: HashSet<String>,
    /// Maximum record age
    pub recency_window: TimeDelta,
    /// Keep at most one record per author within the run
    pub unique_authors: bool,
    /// Minimum clicks of records that report a click count
    pub min_clicks: u64,
}

impl FilterPolicy {
    /// Policy for the site a profile describes.
    #[must_use]
    pub fn from_profile(profile: &SiteProfile) -> Self {
        let settings = &profile.settings;
        Self {
            banned_titles: settings
                .banned_titles
                .iter()
                .filter(|banned| !banned.is_empty())
                .cloned()
                .collect(),
            banned_authors: settings.banned_authors.iter().cloned().collect(),
            allowed_categories: settings.allowed_categories.iter().cloned().collect(),
            recency_window: TimeDelta::try_days(settings.recency_window_days)
                .unwrap_or(TimeDelta::MAX),
            unique_authors: profile.spec.unique_authors,
            min_clicks: settings.min_clicks,
        }
    }
}

impl Default for FilterPolicy {
    fn default() -> Self {
        Self {
            banned_titles: Vec::new(),
            banned_authors: HashSet::new(),
            allowed_categories: HashSet::new(),
            recency_window: TimeDelta::days(harvest_core::config::DEFAULT_RECENCY_WINDOW_DAYS),
            unique_authors: false,
            min_clicks: 0,
        }
    }
}

/// Why a record was dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// A field contains a banned substring
    BannedTitle(String),
    /// The author is banned
    BannedAuthor(String),
    /// The author already has a record in this run
    RepeatedAuthor(String),
    /// The record has fewer clicks than the threshold
    TooFewClicks {
        /// Clicks reported by the listing
        clicks: u64,
        /// Configured minimum
        threshold: u64,
    },
    /// The record is older than the recency window
    Stale {
        /// Record timestamp
        timestamp: DateTime<Utc>,
    },
    /// The category is not on the allow-list
    CategoryNotAllowed(Option<String>),
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::BannedTitle(banned) => write!(f, "matches banned text '{banned}'"),
            Self::BannedAuthor(author) => write!(f, "author '{author}' is banned"),
            Self::RepeatedAuthor(author) => write!(f, "author '{author}' already listed"),
            Self::TooFewClicks { clicks, threshold } => {
                write!(f, "{clicks} clicks, below {threshold}")
            }
            Self::Stale { timestamp } => write!(f, "stale since {timestamp}"),
            Self::CategoryNotAllowed(Some(category)) => {
                write!(f, "category '{category}' not allowed")
            }
            Self::CategoryNotAllowed(None) => f.write_str("no category"),
        }
    }
}

/// Applies a [`FilterPolicy`] to the records of one run.
///
/// Holds the run's seen-authors set, so one validator serves exactly one
/// run and may be shared by all of its page workers.
#[derive(Debug)]
pub struct Validator {
    policy: FilterPolicy,
    reference: DateTime<Utc>,
    seen_authors: Mutex<HashSet<String>>,
}

impl Validator {
    /// Create a validator judging recency against `reference`.
    #[must_use]
    pub fn new(policy: FilterPolicy, reference: DateTime<Utc>) -> Self {
        Self {
            policy,
            reference,
            seen_authors: Mutex::new(HashSet::new()),
        }
    }

    /// Policy in force.
    #[must_use]
    pub fn policy(&self) -> &FilterPolicy {
        &self.policy
    }

    /// Run all checks in order.
    ///
    /// The author is claimed at the uniqueness check, so a later record by
    /// the same author is rejected even if this one fails a later check.
    pub fn check(&self, record: &Record) -> Result<(), Rejection> {
        self.check_bans(record)?;
        self.claim_author(record)?;
        self.check_clicks(record)?;
        self.check_recency(record)?;
        self.check_category(record)
    }

    /// Whether a record passes; rejections are logged at debug level.
    pub fn is_valid(&self, record: &Record) -> bool {
        match self.check(record) {
            Ok(()) => true,
            Err(reason) => {
                debug!(
                    site = %record.site,
                    key = %record.key,
                    reason = %reason,
                    "record rejected"
                );
                false
            }
        }
    }

    fn check_bans(&self, record: &Record) -> Result<(), Rejection> {
        let subjects = record.ban_subjects();
        if let Some(banned) = self
            .policy
            .banned_titles
            .iter()
            .find(|banned| subjects.iter().any(|subject| subject.contains(banned.as_str())))
        {
            return Err(Rejection::BannedTitle(banned.clone()));
        }

        match &record.author {
            Some(author) if self.policy.banned_authors.contains(author) => {
                Err(Rejection::BannedAuthor(author.clone()))
            }
            _ => Ok(()),
        }
    }

    fn claim_author(&self, record: &Record) -> Result<(), Rejection> {
        if !self.policy.unique_authors {
            return Ok(());
        }
        let Some(author) = &record.author else {
            return Ok(());
        };

        let mut seen = self
            .seen_authors
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if seen.insert(author.clone()) {
            Ok(())
        } else {
            Err(Rejection::RepeatedAuthor(author.clone()))
        }
    }

    fn check_clicks(&self, record: &Record) -> Result<(), Rejection> {
        match record.body {
            RecordBody::Album { clicks, .. } if clicks < self.policy.min_clicks => {
                Err(Rejection::TooFewClicks {
                    clicks,
                    threshold: self.policy.min_clicks,
                })
            }
            _ => Ok(()),
        }
    }

    fn check_recency(&self, record: &Record) -> Result<(), Rejection> {
        // Overflowing the calendar means the window reaches past any reference.
        match record.timestamp.checked_add_signed(self.policy.recency_window) {
            Some(expires) if expires < self.reference => Err(Rejection::Stale {
                timestamp: record.timestamp,
            }),
            _ => Ok(()),
        }
    }

    fn check_category(&self, record: &Record) -> Result<(), Rejection> {
        if self.policy.allowed_categories.is_empty() {
            return Ok(());
        }
        match &record.category {
            Some(category) if self.policy.allowed_categories.contains(category) => Ok(()),
            other => Err(Rejection::CategoryNotAllowed(other.clone())),
        }
    }
}
