//! Page set planning.
//!
//! A run visits a finite, enumerated page set. The planner fetches page 1,
//! reads the total page count from it and expands the URL template for every
//! index in `1..=count`. Counts above the configured ceiling are clamped.

use crate::error::DiscoveryError;
use harvest_fetch::Fetcher;
use harvest_sites::{CountPolicy, Extractor};
use tracing::{debug, info, warn};

const PLACEHOLDERS: [&str; 2] = ["%d", "{page}"];

/// One page to visit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageUrl {
    index: u32,
    url: String,
}

impl PageUrl {
    /// 1-based page index.
    #[must_use]
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Concrete URL of the page.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Ordered, immutable set of pages for one run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PagePlan {
    pages: Vec<PageUrl>,
}

impl PagePlan {
    /// Pages in ascending index order.
    #[must_use]
    pub fn pages(&self) -> &[PageUrl] {
        &self.pages
    }

    /// Number of planned pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Whether there is nothing to fetch.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Iterate over the pages in order.
    pub fn iter(&self) -> std::slice::Iter<'_, PageUrl> {
        self.pages.iter()
    }
}

impl<'a> IntoIterator for &'a PagePlan {
    type Item = &'a PageUrl;
    type IntoIter = std::slice::Iter<'a, PageUrl>;

    fn into_iter(self) -> Self::IntoIter {
        self.pages.iter()
    }
}

fn placeholder_count(template: &str) -> usize {
    PLACEHOLDERS
        .iter()
        .map(|placeholder| template.matches(placeholder).count())
        .sum()
}

fn check_template(template: &str) -> Result<(), DiscoveryError> {
    match placeholder_count(template) {
        1 => Ok(()),
        placeholders => Err(DiscoveryError::InvalidTemplate {
            template: template.to_string(),
            placeholders,
        }),
    }
}

fn substitute(template: &str, index: u32) -> String {
    let index = index.to_string();
    PLACEHOLDERS
        .iter()
        .fold(template.to_string(), |url, placeholder| {
            url.replace(placeholder, &index)
        })
}

/// Expand `template` for pages `1..=count`.
///
/// A non-positive count gives an empty plan.
///
/// # Errors
/// Returns `DiscoveryError::InvalidTemplate` unless the template holds
/// exactly one placeholder.
pub fn expand(template: &str, count: i64) -> Result<PagePlan, DiscoveryError> {
    check_template(template)?;

    let last = u32::try_from(count.max(0)).unwrap_or(u32::MAX);
    let pages = (1..=last)
        .map(|index| PageUrl {
            index,
            url: substitute(template, index),
        })
        .collect();

    Ok(PagePlan { pages })
}

/// Fetch page 1 and plan the full page set, at most `max_pages` long.
///
/// # Errors
/// Returns `DiscoveryError` if the template is invalid, fetching page 1
/// fails, or the count is unreadable under [`CountPolicy::Strict`].
pub async fn plan(
    fetcher: &dyn Fetcher,
    template: &str,
    extractor: &dyn Extractor,
    policy: CountPolicy,
    max_pages: u32,
) -> Result<PagePlan, DiscoveryError> {
    check_template(template)?;

    let first_url = substitute(template, 1);
    debug!(url = %first_url, "reading page count from page 1");

    let first = fetcher
        .fetch(&first_url)
        .await
        .map_err(|source| DiscoveryError::FirstPageFailed {
            url: first_url.clone(),
            source,
        })?;

    let count = match (extractor.page_count(&first.body), policy) {
        (Some(count), _) => count,
        (None, CountPolicy::Fallback(fallback)) => {
            warn!(
                url = %first_url,
                fallback,
                "page count not found, using configured fallback"
            );
            fallback
        }
        (None, CountPolicy::Strict) => {
            return Err(DiscoveryError::CountUnavailable { url: first_url });
        }
    };

    let ceiling = i64::from(max_pages);
    let count = if count > ceiling {
        warn!(
            url = %first_url,
            count,
            max_pages,
            "page count above ceiling, planning only the first pages"
        );
        ceiling
    } else {
        count
    };

    let plan = expand(template, count)?;
    info!(site = %extractor.kind(), pages = plan.len(), "planned page set");
    Ok(plan)
}
