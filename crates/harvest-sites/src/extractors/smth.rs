//! newsmth.net house-rent board.
//!
//! Each thread row carries title, author, reply count and the time of the
//! last reply. Recent rows show only a clock time, older ones only a date,
//! both in the site's local time (UTC+8).

use crate::error::ExtractionError;
use crate::extractor::{first_text, leading_number, selector, text_of, Extractor, PageContext};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use harvest_core::{DedupKey, Origin, Record, RecordBody, SiteKind};
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

static ROWS: OnceLock<Selector> = OnceLock::new();
static TITLE: OnceLock<Selector> = OnceLock::new();
static AUTHOR: OnceLock<Selector> = OnceLock::new();
static COMMENTS: OnceLock<Selector> = OnceLock::new();
static LAST: OnceLock<Selector> = OnceLock::new();
static PAGE_COUNT: OnceLock<Selector> = OnceLock::new();

const SITE_OFFSET_SECS: i32 = 8 * 3600;

/// Extractor for the forum board.
#[derive(Debug, Default, Clone, Copy)]
pub struct SmthExtractor;

/// Parse a last-reply cell: `YYYY-MM-DD`, or `HH:MM[:SS]` meaning today.
///
/// "Today" is the fetch day in site time.
pub fn parse_last_reply(text: &str, fetched_at: DateTime<Utc>) -> Option<DateTime<Utc>> {
    let text = text.trim();
    let offset = FixedOffset::east_opt(SITE_OFFSET_SECS)?;

    let local = if text.contains('-') {
        let date = NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?;
        date.and_hms_opt(0, 0, 0)?
    } else if text.contains(':') {
        let time = NaiveTime::parse_from_str(text, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(text, "%H:%M"))
            .ok()?;
        fetched_at.with_timezone(&offset).date_naive().and_time(time)
    } else {
        return None;
    };

    offset
        .from_local_datetime(&local)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

impl SmthExtractor {
    fn extract_row(
        context: &PageContext,
        row: ElementRef<'_>,
        position: usize,
    ) -> Result<Record, ExtractionError> {
        let article = row
            .select(selector(&TITLE, "td.title_9 a"))
            .next()
            .ok_or(ExtractionError::MissingField { field: "title" })?;
        let title = text_of(article);
        if title.is_empty() {
            return Err(ExtractionError::MissingField { field: "title" });
        }
        let href = article
            .value()
            .attr("href")
            .map(|href| context.absolute(href.trim()))
            .ok_or(ExtractionError::MissingField { field: "href" })?;

        let author = first_text(row, selector(&AUTHOR, "td.title_12 a"))
            .ok_or(ExtractionError::MissingField { field: "author" })?;

        let comments = row
            .select(selector(&COMMENTS, "td.title_11"))
            .nth(2)
            .and_then(|cell| text_of(cell).parse::<u32>().ok())
            .unwrap_or(0);

        let last = first_text(row, selector(&LAST, "td.title_10 a"))
            .ok_or(ExtractionError::MissingField { field: "last" })?;
        let timestamp = parse_last_reply(&last, context.fetched_at).ok_or_else(|| {
            ExtractionError::Malformed {
                field: "last",
                value: last.clone(),
            }
        })?;

        Ok(Record {
            site: SiteKind::Smth,
            key: DedupKey::from_parts(&[title.as_str(), author.as_str()])?,
            title,
            href,
            author: Some(author),
            category: None,
            timestamp,
            origin: Origin {
                page: context.page,
                position,
            },
            body: RecordBody::Forum { comments },
        })
    }
}

impl Extractor for SmthExtractor {
    fn kind(&self) -> SiteKind {
        SiteKind::Smth
    }

    fn page_count(&self, body: &str) -> Option<i64> {
        Html::parse_document(body)
            .select(selector(
                &PAGE_COUNT,
                "ul.pagination ol.page-main li:nth-last-child(2) a",
            ))
            .next()
            .and_then(|link| leading_number(&text_of(link)))
    }

    fn extract(
        &self,
        context: &PageContext,
        body: &str,
    ) -> Vec<Result<Record, ExtractionError>> {
        let document = Html::parse_document(body);
        document
            .select(selector(
                &ROWS,
                "#main #body .b-content table tbody tr:not(.ad)",
            ))
            .enumerate()
            .map(|(position, row)| Self::extract_row(context, row, position))
            .collect()
    }
}
