//! Harvest Core - Foundation crate for the harvest listing pipeline.
//!
//! This crate provides the shared types, error handling and configuration
//! that all other harvest crates depend on.
//!
//! # Modules
//!
//! - [`error`] - Central error types using thiserror
//! - [`config`] - TOML-based configuration with XDG paths
//! - [`types`] - Shared newtypes and enums (`SiteKind`, `DedupKey`, `Record`, `RunId`)
//!
//! # Example
//!
//! ```rust
//! use harvest_core::{AppConfig, SiteKind};
//!
//! let config = AppConfig::default();
//! let smth = config.site(SiteKind::Smth);
//! assert_eq!(smth.recency_window_days, 15);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod config;
pub mod error;
pub mod types;

// Re-export commonly used types
pub use config::{AppConfig, Delimiter, GeneralConfig, HttpConfig, SiteConfig, SitesConfig};
pub use error::{ConfigError, ConfigResult, HarvestError, Result};
pub use types::{DedupKey, Origin, Record, RecordBody, RunId, SiteKind};
