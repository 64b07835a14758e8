//! JSON image board.
//!
//! The listing is a JSON document paged through a `page=N` query parameter:
//!
//! ```json
//! {"statu": 1, "total": "2", "pages": 5,
//!  "list": [{"id": "1024", "arcurl": "/a/1024.html", "click": "5300", "picnum": 12}]}
//! ```
//!
//! Some boards prefix the body with a UTF-8 byte order mark. Every album
//! links to an HTML page holding its images; they are saved under a
//! directory named after the album id.

use crate::error::ExtractionError;
use crate::extractor::{selector, AssetLink, Extractor, PageContext};
use harvest_core::{DedupKey, Origin, Record, RecordBody, SiteKind};
use harvest_fetch::{resource_name, resource_suffix};
use scraper::{ElementRef, Html, Selector};
use serde::Deserialize;
use std::sync::OnceLock;

static IMAGES: OnceLock<Selector> = OnceLock::new();

#[derive(Debug, Deserialize)]
struct Collection {
    #[serde(default)]
    list: Vec<Album>,
    pages: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Album {
    #[serde(default)]
    id: String,
    #[serde(default)]
    arcurl: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    click: String,
}

fn parse(body: &str) -> serde_json::Result<Collection> {
    serde_json::from_str(body.trim_start_matches('\u{feff}'))
}

/// Extractor for the JSON album listing and the HTML album pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct ImgExtractor;

impl ImgExtractor {
    fn extract_album(
        context: &PageContext,
        album: &Album,
        position: usize,
    ) -> Result<Record, ExtractionError> {
        let id = album.id.trim();
        if id.is_empty() {
            return Err(ExtractionError::MissingField { field: "id" });
        }
        let link = album.arcurl.trim();
        if link.is_empty() {
            return Err(ExtractionError::MissingField { field: "arcurl" });
        }
        let clicks = album
            .click
            .trim()
            .parse()
            .map_err(|_| ExtractionError::Malformed {
                field: "click",
                value: album.click.clone(),
            })?;

        let title = Some(album.title.trim())
            .filter(|title| !title.is_empty())
            .unwrap_or(id)
            .to_string();

        Ok(Record {
            site: SiteKind::Img,
            key: DedupKey::new(id)?,
            title,
            href: context.absolute(link),
            author: None,
            category: None,
            timestamp: context.fetched_at,
            origin: Origin {
                page: context.page,
                position,
            },
            body: RecordBody::Album {
                clicks,
                directory: id.to_string(),
                images: 0,
                failed: 0,
            },
        })
    }

    fn asset(context: &PageContext, img: ElementRef<'_>) -> Result<AssetLink, ExtractionError> {
        let src = img
            .value()
            .attr("data-original")
            .map(str::trim)
            .filter(|src| !src.is_empty())
            .map(|src| context.absolute(src))
            .ok_or(ExtractionError::MissingField {
                field: "data-original",
            })?;
        let malformed = |_| ExtractionError::Malformed {
            field: "data-original",
            value: src.clone(),
        };
        let name = resource_name(&src).map_err(malformed)?;
        let suffix = resource_suffix(&src).map_err(malformed)?;

        Ok(AssetLink { name, suffix, src })
    }
}

impl Extractor for ImgExtractor {
    fn kind(&self) -> SiteKind {
        SiteKind::Img
    }

    fn page_count(&self, body: &str) -> Option<i64> {
        parse(body).ok().and_then(|collection| collection.pages)
    }

    fn extract(
        &self,
        context: &PageContext,
        body: &str,
    ) -> Vec<Result<Record, ExtractionError>> {
        match parse(body) {
            Ok(collection) => collection
                .list
                .iter()
                .enumerate()
                .map(|(position, album)| Self::extract_album(context, album, position))
                .collect(),
            Err(e) => vec![Err(ExtractionError::Malformed {
                field: "listing",
                value: e.to_string(),
            })],
        }
    }

    fn detail_assets(
        &self,
        context: &PageContext,
        document: &Html,
    ) -> Vec<Result<AssetLink, ExtractionError>> {
        document
            .select(selector(
                &IMAGES,
                "div.wp #container a[data-id] img[data-original]",
            ))
            .map(|img| Self::asset(context, img))
            .collect()
    }
}
