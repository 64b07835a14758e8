//! Error types for the site subsystem.

use harvest_core::HarvestError;
use thiserror::Error;

/// A single listing element could not be turned into a record.
///
/// Scoped to one element: siblings on the same page are unaffected.
#[derive(Error, Debug)]
pub enum ExtractionError {
    /// A required field is absent or empty
    #[error("missing field '{field}'")]
    MissingField {
        /// Field name
        field: &'static str,
    },

    /// A field is present but cannot be parsed
    #[error("malformed field '{field}': '{value}'")]
    Malformed {
        /// Field name
        field: &'static str,
        /// Raw text found in the document
        value: String,
    },

    /// The identity fields do not form a usable dedup key
    #[error("invalid identity: {0}")]
    InvalidKey(#[from] HarvestError),
}

/// Errors building a site profile from configuration.
#[derive(Error, Debug)]
pub enum SiteError {
    /// The page template is not a usable URL
    #[error("invalid page template for {site}: {reason}")]
    InvalidTemplate {
        /// Site tag
        site: String,
        /// Reason the template was rejected
        reason: String,
    },
}

/// Result type for site operations.
pub type Result<T> = std::result::Result<T, SiteError>;
