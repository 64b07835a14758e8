//! Harvest Sites - site table and page extractors for the harvest pipeline.
//!
//! This crate knows what each supported site looks like: how to read the
//! page count off the first listing page, how to turn listing elements into
//! records, and which optional pipeline features the site needs.
//!
//! # Architecture
//!
//! - **Extractor** ([`extractor`]): the pure, per-site extraction trait
//! - **Definitions** ([`definition`]): the closed `SiteKind` lookup table
//! - **Profiles** ([`profile`]): site behaviour combined with configuration
//! - **Extractors** ([`extractors`]): forum, rental, gallery and album parsers
//!
//! # Example
//!
//! ```rust
//! use harvest_core::{AppConfig, SiteKind};
//! use harvest_sites::{CountPolicy, SiteProfile};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AppConfig::default();
//! let profile = SiteProfile::from_config(&config, SiteKind::Tc)?;
//!
//! assert_eq!(profile.count_policy, CountPolicy::Fallback(10));
//! assert!(profile.spec.stop_on_redirect);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod definition;
pub mod error;
pub mod extractor;
pub mod extractors;
pub mod profile;

// Re-export commonly used types
pub use definition::{CountPolicy, SiteSpec};
pub use error::{ExtractionError, Result, SiteError};
pub use extractor::{AssetLink, Extractor, PageContext};
pub use profile::SiteProfile;
