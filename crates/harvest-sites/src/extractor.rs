//! The extraction boundary between fetched documents and records.
//!
//! Extractors are pure: they read one fetched listing body plus its
//! [`PageContext`] and return candidates. Listing bodies are handed over
//! raw because not every site serves HTML; detail pages are always HTML. They never touch shared state,
//! which keeps them safe to run on any number of pages at once.

use crate::error::ExtractionError;
use chrono::{DateTime, Utc};
use harvest_core::{Record, SiteKind};
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;
use url::Url;

/// Where a document came from.
#[derive(Debug, Clone)]
pub struct PageContext {
    /// URL the document was fetched from
    pub url: String,
    /// 1-based index of the page in the plan
    pub page: u32,
    /// When the document was fetched
    pub fetched_at: DateTime<Utc>,
}

impl PageContext {
    /// Resolve a possibly relative link against the page URL.
    ///
    /// Falls back to the raw link when the page URL itself is unusable.
    #[must_use]
    pub fn absolute(&self, href: &str) -> String {
        Url::parse(&self.url)
            .and_then(|base| base.join(href))
            .map_or_else(|_| href.to_string(), |url| url.to_string())
    }
}

/// An asset referenced from a detail page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetLink {
    /// File stem the asset is stored under
    pub name: String,
    /// File extension including the dot
    pub suffix: String,
    /// URL the asset is downloaded from
    pub src: String,
}

/// Per-site extraction logic.
pub trait Extractor: Send + Sync {
    /// Site this extractor understands.
    fn kind(&self) -> SiteKind;

    /// Total number of listing pages, read from the body of page 1.
    fn page_count(&self, body: &str) -> Option<i64>;

    /// One entry per listing element on the page.
    fn extract(
        &self,
        context: &PageContext,
        body: &str,
    ) -> Vec<std::result::Result<Record, ExtractionError>>;

    /// Assets linked from a detail page. Sites without detail pages have
    /// none.
    fn detail_assets(
        &self,
        _context: &PageContext,
        _document: &Html,
    ) -> Vec<std::result::Result<AssetLink, ExtractionError>> {
        Vec::new()
    }
}

/// Parse a constant selector once.
///
/// Only ever called with string literals, so a parse failure is a
/// programming error.
pub(crate) fn selector(cell: &'static OnceLock<Selector>, css: &str) -> &'static Selector {
    cell.get_or_init(|| Selector::parse(css).expect("constant selector parses"))
}

/// Text content with runs of whitespace collapsed to single spaces.
pub(crate) fn text_of(element: ElementRef<'_>) -> String {
    element
        .text()
        .flat_map(str::split_whitespace)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Text of the first match of `sel` inside `element`, if non-empty.
pub(crate) fn first_text(element: ElementRef<'_>, sel: &Selector) -> Option<String> {
    element
        .select(sel)
        .next()
        .map(text_of)
        .filter(|text| !text.is_empty())
}

/// First run of digits in `text`, e.g. `"共 27 页"` gives 27.
pub(crate) fn leading_number(text: &str) -> Option<i64> {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS
        .get_or_init(|| Regex::new(r"\d+").expect("constant regex parses"))
        .find(text)
        .and_then(|m| m.as_str().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_absolute_links() {
        let context = PageContext {
            url: "http://www.newsmth.net/nForum/board/HouseRent?ajax&p=2".to_string(),
            page: 2,
            fetched_at: Utc::now(),
        };
        assert_eq!(
            context.absolute("/nForum/article/HouseRent/1"),
            "http://www.newsmth.net/nForum/article/HouseRent/1"
        );
        assert_eq!(
            context.absolute("http://bj.58.com/hezu/1.shtml"),
            "http://bj.58.com/hezu/1.shtml"
        );
    }

    #[test]
    fn test_text_collapses_whitespace() {
        let html = Html::parse_fragment("<p>  2 rooms \n\t 1 hall  </p>");
        let sel = Selector::parse("p").expect("selector");
        let p = html.select(&sel).next().expect("p element");
        assert_eq!(text_of(p), "2 rooms 1 hall");
    }

    #[test]
    fn test_leading_number() {
        assert_eq!(leading_number(" 27 "), Some(27));
        assert_eq!(leading_number("共 12 页"), Some(12));
        assert_eq!(leading_number("next"), None);
    }
}
