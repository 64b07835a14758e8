//! Persistent record of exported identity keys.
//!
//! The pipeline asks [`DedupStore::seen`] before keeping a record and calls
//! [`DedupStore::mark_seen`] when it accepts one. `mark_seen` doubles as a
//! claim: only the caller that actually inserted a key gets `true`, so two
//! workers racing on the same key never both keep the record.
//!
//! Sites that download assets link by link also keep a per-link marker with
//! the download outcome, see [`DedupStore::asset_downloaded`].

use crate::error::StoreError;
use crate::{asset_markers, seen_keys};
use async_trait::async_trait;
use harvest_core::{DedupKey, SiteKind};
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

/// Key/value presence store used for cross-run deduplication.
#[async_trait]
pub trait DedupStore: Send + Sync {
    /// Whether `key` was recorded for `site` by this or an earlier run.
    async fn seen(&self, site: SiteKind, key: &DedupKey) -> Result<bool, StoreError>;

    /// Record `key` for `site`.
    ///
    /// Returns `true` if this call recorded the key, `false` if it was
    /// already present.
    async fn mark_seen(&self, site: SiteKind, key: &DedupKey) -> Result<bool, StoreError>;

    /// Whether the asset at `link` was downloaded successfully before.
    async fn asset_downloaded(&self, site: SiteKind, link: &str) -> Result<bool, StoreError>;

    /// Record whether downloading `link` succeeded.
    async fn mark_asset(&self, site: SiteKind, link: &str, downloaded: bool)
        -> Result<(), StoreError>;
}

/// [`DedupStore`] backed by the `seen_keys` table.
#[derive(Debug, Clone)]
pub struct SqliteDedupStore {
    pool: SqlitePool,
}

impl SqliteDedupStore {
    /// Create a store over an already-migrated pool.
    #[must_use]
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DedupStore for SqliteDedupStore {
    async fn seen(&self, site: SiteKind, key: &DedupKey) -> Result<bool, StoreError> {
        seen_keys::is_seen(&self.pool, site.as_str(), key.as_str())
            .await
            .map_err(|source| StoreError::Read {
                key: key.to_string(),
                source,
            })
    }

    async fn mark_seen(&self, site: SiteKind, key: &DedupKey) -> Result<bool, StoreError> {
        seen_keys::mark_seen(&self.pool, site.as_str(), key.as_str())
            .await
            .map_err(|source| StoreError::Write {
                key: key.to_string(),
                source,
            })
    }

    async fn asset_downloaded(&self, site: SiteKind, link: &str) -> Result<bool, StoreError> {
        asset_markers::is_downloaded(&self.pool, site.as_str(), link)
            .await
            .map_err(|source| StoreError::Read {
                key: link.to_string(),
                source,
            })
    }

    async fn mark_asset(
        &self,
        site: SiteKind,
        link: &str,
        downloaded: bool,
    ) -> Result<(), StoreError> {
        asset_markers::record(&self.pool, site.as_str(), link, downloaded)
            .await
            .map_err(|source| StoreError::Write {
                key: link.to_string(),
                source,
            })
    }
}

/// In-memory [`DedupStore`] for tests and dry runs.
///
/// Nothing survives the process.
#[derive(Debug, Default)]
pub struct MemoryDedupStore {
    keys: Mutex<HashSet<(SiteKind, DedupKey)>>,
    assets: Mutex<HashMap<(SiteKind, String), bool>>,
}

impl MemoryDedupStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of keys recorded across all sites.
    #[must_use]
    pub fn len(&self) -> usize {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether no key has been recorded yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl DedupStore for MemoryDedupStore {
    async fn seen(&self, site: SiteKind, key: &DedupKey) -> Result<bool, StoreError> {
        let keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.contains(&(site, key.clone())))
    }

    async fn mark_seen(&self, site: SiteKind, key: &DedupKey) -> Result<bool, StoreError> {
        let mut keys = self.keys.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(keys.insert((site, key.clone())))
    }

    async fn asset_downloaded(&self, site: SiteKind, link: &str) -> Result<bool, StoreError> {
        let assets = self.assets.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(assets
            .get(&(site, link.to_string()))
            .copied()
            .unwrap_or(false))
    }

    async fn mark_asset(
        &self,
        site: SiteKind,
        link: &str,
        downloaded: bool,
    ) -> Result<(), StoreError> {
        let mut assets = self.assets.lock().unwrap_or_else(PoisonError::into_inner);
        assets.insert((site, link.to_string()), downloaded);
        Ok(())
    }
}
