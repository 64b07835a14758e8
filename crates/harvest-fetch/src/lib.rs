//! Fetch collaborator for the harvest pipeline.
//!
//! Provides page and binary fetches over HTTP, a canned in-memory fetcher
//! for tests, and the asset download helper used by gallery sites.

pub mod assets;
pub mod client;
pub mod error;
pub mod memory;

pub use assets::{download_asset, resource_name, resource_suffix, AssetOutcome};
pub use client::{FetchedPage, Fetcher, HttpFetcher};
pub use error::{FetchError, Result};
pub use memory::StaticFetcher;
