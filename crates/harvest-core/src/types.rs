//! Shared types used across the harvest pipeline.
//!
//! This module defines the newtypes and enums every crate agrees on: which
//! site a run targets, how a record identifies itself for deduplication, and
//! the record shape that flows from extraction to export.

use crate::error::HarvestError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Closed set of supported sites.
///
/// Each kind carries its own extractor, page template and output schema; the
/// pipeline resolves those once per run from the site table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SiteKind {
    /// newsmth.net house-rent forum board
    Smth,
    /// 58.com rental listings
    Tc,
    /// mafengwo.cn travel-notes photo gallery
    Mfw,
    /// Image board serving its album listing as JSON
    Img,
}

impl SiteKind {
    /// Every supported site, in display order.
    pub const ALL: [SiteKind; 4] = [Self::Smth, Self::Tc, Self::Mfw, Self::Img];

    /// Short tag used in config sections, file names and dedup namespaces.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Smth => "smth",
            Self::Tc => "tc",
            Self::Mfw => "mfw",
            Self::Img => "img",
        }
    }

    /// Column headers of the exported table for this site.
    #[must_use]
    pub fn columns(&self) -> &'static [&'static str] {
        match self {
            Self::Smth => &["title", "href", "author", "comments", "last"],
            Self::Tc => &[
                "title", "rental", "room", "district", "address", "href", "landlord", "last",
            ],
            Self::Mfw => &["title", "href", "directory", "images", "failed"],
            Self::Img => &["title", "href", "clicks", "directory", "images", "failed"],
        }
    }
}

impl fmt::Display for SiteKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SiteKind {
    type Err = HarvestError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| HarvestError::UnknownSite {
                name: s.to_string(),
            })
    }
}

/// Identity of a record for cross-run deduplication.
///
/// Keys are never empty; a key built from parts requires every part to carry
/// some text so that `title_` style half-keys cannot collide.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DedupKey(String);

impl DedupKey {
    /// Create a key from a single identity string.
    ///
    /// # Errors
    /// Returns error if the key is empty or only whitespace.
    pub fn new(key: impl Into<String>) -> Result<Self, HarvestError> {
        let key = key.into();
        if key.trim().is_empty() {
            return Err(HarvestError::EmptyKey);
        }
        Ok(Self(key))
    }

    /// Join identity fields with `_`, e.g. title and author.
    ///
    /// # Errors
    /// Returns error if there are no parts or any part is blank.
    pub fn from_parts(parts: &[&str]) -> Result<Self, HarvestError> {
        if parts.is_empty() {
            return Err(HarvestError::MissingKeyParts);
        }
        if let Some(idx) = parts.iter().position(|p| p.trim().is_empty()) {
            return Err(HarvestError::BlankKeyPart { index: idx });
        }
        Ok(Self(parts.join("_")))
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DedupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identifier of one pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunId(String);

impl RunId {
    /// Create a new random `RunId` using UUID v4.
    #[must_use]
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Get the inner string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where on the planned page set a record was found.
///
/// Used to give the exported table a stable order regardless of which page
/// finished first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Origin {
    /// 1-based page index from the page plan
    pub page: u32,
    /// 0-based position of the listing element on that page
    pub position: usize,
}

/// Site-specific part of a record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RecordBody {
    /// Forum thread
    Forum {
        /// Number of replies
        comments: u32,
    },
    /// Rental listing
    Rental {
        /// Monthly rent
        rental: f64,
        /// Room description (e.g. "2 rooms 1 hall")
        room: String,
        /// District, first word of the address
        district: String,
        /// Full address line
        address: String,
    },
    /// Gallery post whose images were downloaded into `directory`
    Gallery {
        /// Directory (relative to the site download dir) holding the assets
        directory: String,
        /// Number of images saved
        images: usize,
        /// Number of images that failed to download
        failed: usize,
    },
    /// Image album listed with its click count
    Album {
        /// Clicks reported by the listing
        clicks: u64,
        /// Directory (relative to the site download dir) holding the assets
        directory: String,
        /// Number of images saved, including ones saved by earlier runs
        images: usize,
        /// Number of images that failed to download
        failed: usize,
    },
}

/// One extracted listing.
///
/// Owned by the run that created it; the pipeline only ever moves records,
/// never edits one after it passed validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Site the record came from
    pub site: SiteKind,
    /// Identity used for deduplication
    pub key: DedupKey,
    /// Listing title
    pub title: String,
    /// Absolute link to the listing
    pub href: String,
    /// Author, landlord or poster, when the site exposes one
    pub author: Option<String>,
    /// Category used by allow-lists (district for rentals)
    pub category: Option<String>,
    /// Last update time used for recency filtering
    pub timestamp: DateTime<Utc>,
    /// Page and position the record was extracted from
    pub origin: Origin,
    /// Site-specific fields
    pub body: RecordBody,
}

impl Record {
    /// Text fields a ban list is matched against: title, category, and any
    /// site-specific label such as the room type.
    #[must_use]
    pub fn ban_subjects(&self) -> Vec<&str> {
        let mut subjects = vec![self.title.as_str()];
        if let Some(category) = &self.category {
            subjects.push(category);
        }
        if let RecordBody::Rental { room, .. } = &self.body {
            subjects.push(room);
        }
        subjects
    }

    /// Replace the site-specific body, consuming the record.
    #[must_use]
    pub fn with_body(self, body: RecordBody) -> Self {
        Self { body, ..self }
    }

    /// Render the record as one export row, in the order of
    /// [`SiteKind::columns`].
    #[must_use]
    pub fn row(&self) -> Vec<String> {
        let last = self.timestamp.to_rfc3339();
        let author = self.author.clone().unwrap_or_default();
        match &self.body {
            RecordBody::Forum { comments } => vec![
                self.title.clone(),
                self.href.clone(),
                author,
                comments.to_string(),
                last,
            ],
            RecordBody::Rental {
                rental,
                room,
                district,
                address,
            } => vec![
                self.title.clone(),
                rental.to_string(),
                room.clone(),
                district.clone(),
                address.clone(),
                self.href.clone(),
                author,
                last,
            ],
            RecordBody::Gallery {
                directory,
                images,
                failed,
            } => vec![
                self.title.clone(),
                self.href.clone(),
                directory.clone(),
                images.to_string(),
                failed.to_string(),
            ],
            RecordBody::Album {
                clicks,
                directory,
                images,
                failed,
            } => vec![
                self.title.clone(),
                self.href.clone(),
                clicks.to_string(),
                directory.clone(),
                images.to_string(),
                failed.to_string(),
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rental() -> Record {
        Record {
            site: SiteKind::Tc,
            key: DedupKey::from_parts(&["Sunny flat", "2 rooms"]).expect("valid key"),
            title: "Sunny flat".to_string(),
            href: "http://bj.58.com/hezu/1.shtml".to_string(),
            author: Some("Mr. Li".to_string()),
            category: Some("Chaoyang".to_string()),
            timestamp: Utc.with_ymd_and_hms(2018, 3, 1, 8, 0, 0).unwrap(),
            origin: Origin { page: 1, position: 0 },
            body: RecordBody::Rental {
                rental: 2500.0,
                room: "2 rooms".to_string(),
                district: "Chaoyang".to_string(),
                address: "Chaoyang Wangjing".to_string(),
            },
        }
    }

    #[test]
    fn test_site_kind_parse() {
        assert_eq!("smth".parse::<SiteKind>().expect("parse smth"), SiteKind::Smth);
        assert_eq!(" TC ".parse::<SiteKind>().expect("parse tc"), SiteKind::Tc);
        assert_eq!("img".parse::<SiteKind>().expect("parse img"), SiteKind::Img);
        assert!("github".parse::<SiteKind>().is_err());
    }

    #[test]
    fn test_album_row_matches_columns() {
        let record = Record {
            site: SiteKind::Img,
            key: DedupKey::new("1024").expect("valid key"),
            title: "Harbour at dusk".to_string(),
            href: "http://img.test/a/1024.html".to_string(),
            author: None,
            category: None,
            timestamp: Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap(),
            origin: Origin { page: 1, position: 0 },
            body: RecordBody::Album {
                clicks: 5300,
                directory: "1024".to_string(),
                images: 3,
                failed: 1,
            },
        };

        let row = record.row();
        assert_eq!(row.len(), SiteKind::Img.columns().len());
        assert_eq!(row[2], "5300");
        assert_eq!(row[3], "1024");
    }

    #[test]
    fn test_site_kind_serialization() {
        let json = serde_json::to_string(&SiteKind::Mfw).expect("serialize site kind");
        assert_eq!(json, "\"mfw\"");
    }

    #[test]
    fn test_dedup_key_rejects_blank() {
        assert!(DedupKey::new("").is_err());
        assert!(DedupKey::new("   ").is_err());
        assert!(DedupKey::from_parts(&[]).is_err());
        assert!(DedupKey::from_parts(&["title", ""]).is_err());
    }

    #[test]
    fn test_dedup_key_from_parts() {
        let key = DedupKey::from_parts(&["Room for rent", "alice"]).expect("valid key");
        assert_eq!(key.as_str(), "Room for rent_alice");
    }

    #[test]
    fn test_run_id_generate() {
        assert_ne!(RunId::generate(), RunId::generate());
    }

    #[test]
    fn test_row_matches_columns() {
        let record = rental();
        let row = record.row();
        assert_eq!(row.len(), SiteKind::Tc.columns().len());
        assert_eq!(row[1], "2500");
        assert_eq!(row[6], "Mr. Li");
        assert_eq!(row[7], "2018-03-01T08:00:00+00:00");
    }

    #[test]
    fn test_ban_subjects_include_room() {
        let record = rental();
        assert_eq!(
            record.ban_subjects(),
            vec!["Sunny flat", "Chaoyang", "2 rooms"]
        );
    }

    #[test]
    fn test_with_body_keeps_identity() {
        let record = rental().with_body(RecordBody::Forum { comments: 3 });
        assert_eq!(record.key.as_str(), "Sunny flat_2 rooms");
        assert_eq!(record.row().len(), SiteKind::Smth.columns().len());
    }
}
