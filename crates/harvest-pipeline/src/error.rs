//! Run-fatal error categories.
//!
//! Only planning and export can stop a run. Fetch, extraction and dedup
//! store failures are logged where they happen and shrink the result set
//! instead.

use harvest_fetch::FetchError;
use std::path::PathBuf;
use thiserror::Error;

/// The page set could not be determined.
#[derive(Debug, Error)]
pub enum DiscoveryError {
    /// The template does not hold exactly one page placeholder.
    #[error("page template '{template}' must contain exactly one %d or {{page}} placeholder, found {placeholders}")]
    InvalidTemplate {
        /// Template as configured
        template: String,
        /// Number of placeholders found
        placeholders: usize,
    },

    /// Fetching the first page failed.
    #[error("cannot read page 1 at {url}: {source}")]
    FirstPageFailed {
        /// URL of page 1
        url: String,
        /// Underlying fetch failure
        #[source]
        source: FetchError,
    },

    /// Page 1 has no readable page count and the site has no fallback.
    #[error("no page count found on {url}")]
    CountUnavailable {
        /// URL of page 1
        url: String,
    },
}

/// The export file could not be produced.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The destination directory could not be created or cleaned.
    #[error("cannot prepare directory {}: {source}", path.display())]
    CreateDir {
        /// Directory path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Writing the temporary file failed.
    #[error("cannot write export in {}: {source}", path.display())]
    Write {
        /// Directory the export was written in
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// Moving the finished file into place failed.
    #[error("cannot persist export to {}: {source}", path.display())]
    Persist {
        /// Final file path
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Why a run ended in the `Failed` state.
#[derive(Debug, Error)]
pub enum RunError {
    /// Planning failed, nothing was fetched.
    #[error("discovery failed: {source}")]
    Discovery {
        /// Underlying discovery error
        #[source]
        source: DiscoveryError,
        /// Pages processed before the failure
        pages_processed: u32,
    },

    /// The result set could not be written.
    #[error("export failed after {pages_processed} pages: {source}")]
    Export {
        /// Underlying export error
        #[source]
        source: ExportError,
        /// Pages processed before the failure
        pages_processed: u32,
    },
}

impl RunError {
    /// Pages successfully processed before the run failed.
    #[must_use]
    pub fn pages_processed(&self) -> u32 {
        match self {
            Self::Discovery {
                pages_processed, ..
            }
            | Self::Export {
                pages_processed, ..
            } => *pages_processed,
        }
    }
}

/// Result type for pipeline runs.
pub type Result<T> = std::result::Result<T, RunError>;
