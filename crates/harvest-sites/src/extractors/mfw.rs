//! mafengwo.cn travel-notes gallery.
//!
//! List pages link to posts; each post page holds the images to download.
//! Posts have no reliable date on the list page, so a record is stamped with
//! its fetch time and the post link alone is its identity.

use crate::error::ExtractionError;
use crate::extractor::{leading_number, selector, text_of, AssetLink, Extractor, PageContext};
use harvest_core::{DedupKey, Origin, Record, RecordBody, SiteKind};
use harvest_fetch::{resource_name, resource_suffix};
use scraper::{ElementRef, Html, Selector};
use std::sync::OnceLock;

static POSTS: OnceLock<Selector> = OnceLock::new();
static PAGE_COUNT: OnceLock<Selector> = OnceLock::new();
static PICTURES: OnceLock<Selector> = OnceLock::new();
static IMAGE: OnceLock<Selector> = OnceLock::new();

/// Extractor for the gallery list and post pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct MfwExtractor;

impl MfwExtractor {
    fn extract_post(
        context: &PageContext,
        link: ElementRef<'_>,
        position: usize,
    ) -> Result<Record, ExtractionError> {
        let raw = link
            .value()
            .attr("href")
            .map(str::trim)
            .filter(|href| !href.is_empty())
            .ok_or(ExtractionError::MissingField { field: "href" })?;
        let href = context.absolute(raw);
        let directory = resource_name(&href).map_err(|_| ExtractionError::Malformed {
            field: "href",
            value: raw.to_string(),
        })?;

        let title = link
            .value()
            .attr("title")
            .map(str::trim)
            .filter(|title| !title.is_empty())
            .map(str::to_string)
            .or_else(|| Some(text_of(link)).filter(|text| !text.is_empty()))
            .unwrap_or_else(|| directory.clone());

        Ok(Record {
            site: SiteKind::Mfw,
            key: DedupKey::new(raw)?,
            title,
            href,
            author: None,
            category: None,
            timestamp: context.fetched_at,
            origin: Origin {
                page: context.page,
                position,
            },
            body: RecordBody::Gallery {
                directory,
                images: 0,
                failed: 0,
            },
        })
    }

    fn asset(context: &PageContext, link: ElementRef<'_>) -> Result<AssetLink, ExtractionError> {
        let href = link
            .value()
            .attr("href")
            .ok_or(ExtractionError::MissingField { field: "href" })?;
        let src = link
            .select(selector(&IMAGE, "img"))
            .next()
            .and_then(|img| img.value().attr("data-rt-src"))
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(|src| context.absolute(src))
            .ok_or(ExtractionError::MissingField {
                field: "data-rt-src",
            })?;

        // The anchor points at the photo page; its id names the file.
        let name = resource_name(&context.absolute(href)).map_err(|_| ExtractionError::Malformed {
            field: "href",
            value: href.to_string(),
        })?;
        let suffix = resource_suffix(&src).map_err(|_| ExtractionError::Malformed {
            field: "data-rt-src",
            value: src.clone(),
        })?;

        Ok(AssetLink { name, suffix, src })
    }
}

impl Extractor for MfwExtractor {
    fn kind(&self) -> SiteKind {
        SiteKind::Mfw
    }

    fn page_count(&self, body: &str) -> Option<i64> {
        Html::parse_document(body)
            .select(selector(&PAGE_COUNT, "div._pagebar div span.count span"))
            .next()
            .and_then(|span| leading_number(&text_of(span)))
    }

    fn extract(
        &self,
        context: &PageContext,
        body: &str,
    ) -> Vec<Result<Record, ExtractionError>> {
        let document = Html::parse_document(body);
        document
            .select(selector(&POSTS, "div.post-list li div.post-cover a"))
            .enumerate()
            .map(|(position, link)| Self::extract_post(context, link, position))
            .collect()
    }

    fn detail_assets(
        &self,
        context: &PageContext,
        document: &Html,
    ) -> Vec<Result<AssetLink, ExtractionError>> {
        document
            .select(selector(&PICTURES, "div._j_content_box div.add_pic a"))
            .map(|link| Self::asset(context, link))
            .collect()
    }
}
