//! The closed table of site behaviours.
//!
//! Everything about a site that is not configuration lives here: which
//! extractor reads it and which pipeline features it switches on.

use crate::extractor::Extractor;
use crate::extractors::{ImgExtractor, MfwExtractor, SmthExtractor, TcExtractor};
use harvest_core::SiteKind;
use std::sync::Arc;

/// What the planner does when page 1 does not reveal a page count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountPolicy {
    /// Fail the run
    Strict,
    /// Use this many pages instead
    Fallback(i64),
}

impl CountPolicy {
    /// Policy for an optional configured fallback.
    #[must_use]
    pub fn from_fallback(fallback: Option<i64>) -> Self {
        fallback.map_or(Self::Strict, Self::Fallback)
    }
}

/// Fixed behaviour of one site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SiteSpec {
    /// Site kind
    pub kind: SiteKind,
    /// Human-readable name
    pub name: &'static str,
    /// Keep at most one listing per author within a run
    pub unique_authors: bool,
    /// Accepted listings link to a detail page with downloadable assets
    pub detail_pages: bool,
    /// A redirected page fetch means the listing ran out; stop fetching
    pub stop_on_redirect: bool,
    /// Remember every asset link with its download outcome and skip links
    /// already saved by an earlier run
    pub asset_markers: bool,
}

const SITES: [SiteSpec; 4] = [
    SiteSpec {
        kind: SiteKind::Smth,
        name: "newsmth house rent",
        unique_authors: true,
        detail_pages: false,
        stop_on_redirect: false,
        asset_markers: false,
    },
    SiteSpec {
        kind: SiteKind::Tc,
        name: "58.com rentals",
        unique_authors: false,
        detail_pages: false,
        stop_on_redirect: true,
        asset_markers: false,
    },
    SiteSpec {
        kind: SiteKind::Mfw,
        name: "mafengwo travel notes",
        unique_authors: false,
        detail_pages: true,
        stop_on_redirect: false,
        asset_markers: false,
    },
    SiteSpec {
        kind: SiteKind::Img,
        name: "json image board",
        unique_authors: false,
        detail_pages: true,
        stop_on_redirect: false,
        asset_markers: true,
    },
];

/// Look up the fixed behaviour of a site.
#[must_use]
pub fn spec(kind: SiteKind) -> &'static SiteSpec {
    match kind {
        SiteKind::Smth => &SITES[0],
        SiteKind::Tc => &SITES[1],
        SiteKind::Mfw => &SITES[2],
        SiteKind::Img => &SITES[3],
    }
}

/// Extractor for a site.
#[must_use]
pub fn extractor(kind: SiteKind) -> Arc<dyn Extractor> {
    match kind {
        SiteKind::Smth => Arc::new(SmthExtractor),
        SiteKind::Tc => Arc::new(TcExtractor),
        SiteKind::Mfw => Arc::new(MfwExtractor),
        SiteKind::Img => Arc::new(ImgExtractor),
    }
}
