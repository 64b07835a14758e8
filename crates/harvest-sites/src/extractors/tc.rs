//! 58.com rental listings.

use crate::error::ExtractionError;
use crate::extractor::{first_text, leading_number, selector, text_of, Extractor, PageContext};
use chrono::{DateTime, Utc};
use harvest_core::{DedupKey, Origin, Record, RecordBody, SiteKind};
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

static ROWS: OnceLock<Selector> = OnceLock::new();
static TITLE: OnceLock<Selector> = OnceLock::new();
static ROOM: OnceLock<Selector> = OnceLock::new();
static LANDLORD: OnceLock<Selector> = OnceLock::new();
static ADDRESS: OnceLock<Selector> = OnceLock::new();
static RENT: OnceLock<Selector> = OnceLock::new();
static PAGER: OnceLock<Selector> = OnceLock::new();

/// Extractor for the rental listing pages.
///
/// The listing time comes from the row's `sortid` attribute, an epoch
/// timestamp in milliseconds. The district is the first word of the address.
#[derive(Debug, Default, Clone, Copy)]
pub struct TcExtractor;

impl TcExtractor {
    fn extract_row(
        context: &PageContext,
        row: ElementRef<'_>,
        position: usize,
    ) -> Result<Record, ExtractionError> {
        let sortid = row
            .value()
            .attr("sortid")
            .ok_or(ExtractionError::MissingField { field: "sortid" })?;
        let timestamp = sortid
            .trim()
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis)
            .ok_or_else(|| ExtractionError::Malformed {
                field: "sortid",
                value: sortid.to_string(),
            })?;

        let link = row
            .select(selector(&TITLE, ".des a"))
            .next()
            .ok_or(ExtractionError::MissingField { field: "title" })?;
        let title = text_of(link);
        let href = link
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .map(|href| context.absolute(href))
            .ok_or(ExtractionError::MissingField { field: "href" })?;

        let room = first_text(row, selector(&ROOM, "p.room"))
            .ok_or(ExtractionError::MissingField { field: "room" })?;
        let landlord = first_text(row, selector(&LANDLORD, ".des .geren"));
        let address = first_text(row, selector(&ADDRESS, ".des p.add"))
            .ok_or(ExtractionError::MissingField { field: "address" })?;
        let district = address
            .split_whitespace()
            .next()
            .unwrap_or_default()
            .to_string();

        let rent_text = first_text(row, selector(&RENT, ".money b"))
            .ok_or(ExtractionError::MissingField { field: "rental" })?;
        let rental = rent_text
            .parse::<f64>()
            .map_err(|_| ExtractionError::Malformed {
                field: "rental",
                value: rent_text.clone(),
            })?;

        Ok(Record {
            site: SiteKind::Tc,
            key: DedupKey::from_parts(&[title.as_str(), room.as_str()])?,
            title,
            href,
            author: landlord,
            category: Some(district.clone()),
            timestamp,
            origin: Origin {
                page: context.page,
                position,
            },
            body: RecordBody::Rental {
                rental,
                room,
                district,
                address,
            },
        })
    }
}

impl Extractor for TcExtractor {
    fn kind(&self) -> SiteKind {
        SiteKind::Tc
    }

    fn page_count(&self, body: &str) -> Option<i64> {
        Html::parse_document(body)
            .select(selector(
                &PAGER,
                "#bottom_ad_li a:not(.next):not(.prv) span",
            ))
            .last()
            .and_then(|span| leading_number(&text_of(span)))
    }

    fn extract(
        &self,
        context: &PageContext,
        body: &str,
    ) -> Vec<Result<Record, ExtractionError>> {
        let document = Html::parse_document(body);
        document
            .select(selector(&ROWS, ".listUl > li[logr][sortid]"))
            .enumerate()
            .map(|(position, row)| Self::extract_row(context, row, position))
            .collect()
    }
}
