//! Harvest Pipeline - crawl, extract, dedup and export.
//!
//! This crate runs one harvest of a listing site: it plans the finite page
//! set, processes every page concurrently, filters and deduplicates the
//! extracted records, and writes the survivors to a delimited file.
//!
//! # Features
//!
//! - Page set discovery from page 1, with an optional page-count fallback and a ceiling
//! - Concurrent page workers, unbounded or capped by configuration
//! - Ban lists, allow-lists, recency window and per-run author uniqueness
//! - Persistent cross-run deduplication through a [`harvest_db::DedupStore`]
//! - Ordered, atomic CSV/TSV export
//! - Cancellation through a per-run `CancellationToken`
//!
//! # Example
//!
//! ```rust,ignore
//! use harvest_pipeline::{PipelineDriver, RunContext};
//! use std::sync::Arc;
//!
//! let context = RunContext::new(profile, Arc::new(dedup_store), cancel.clone());
//! let report = PipelineDriver::new(Arc::new(fetcher)).run(&context).await?;
//! println!("exported {} records", report.records_exported);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]

pub mod aggregator;
pub mod context;
pub mod driver;
pub mod error;
pub mod exporter;
pub mod planner;
pub mod validator;

// Re-export commonly used types
pub use aggregator::{Aggregator, RunResult};
pub use context::RunContext;
pub use driver::{PipelineDriver, RunReport, RunState};
pub use error::{DiscoveryError, ExportError, Result, RunError};
pub use exporter::Exporter;
pub use planner::{PagePlan, PageUrl};
pub use validator::{FilterPolicy, Rejection, Validator};
