//! `harvest forget`: drop a site's dedup state.

use crate::state::AppState;
use harvest_core::SiteKind;
use harvest_db::{asset_markers, seen_keys};
use tracing::info;

/// Rows removed by a forget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Forgotten {
    /// Dedup keys removed
    pub keys: u64,
    /// Asset download markers removed
    pub markers: u64,
}

/// Remove every dedup key and asset marker recorded for `site`.
///
/// The next run of that site exports and downloads everything again. Run
/// history is kept.
pub async fn execute(state: &AppState, site: SiteKind) -> anyhow::Result<Forgotten> {
    let db = state.open_database().await?;
    let keys = seen_keys::forget_site(db.pool(), site.as_str()).await?;
    let markers = asset_markers::forget_site(db.pool(), site.as_str()).await?;
    db.close().await;

    info!(%site, keys, markers, "forgot dedup state");
    Ok(Forgotten { keys, markers })
}
