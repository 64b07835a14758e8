//! `harvest config-path`: where configuration and data live.

use crate::state::AppState;
use std::path::PathBuf;

/// Locations used by the current configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locations {
    /// Config file read at startup
    pub config: PathBuf,
    /// Dedup and run-history database
    pub database: PathBuf,
    /// Export root
    pub downloads: PathBuf,
}

/// Resolve the locations for `state`.
pub fn execute(state: &AppState) -> anyhow::Result<Locations> {
    Ok(Locations {
        config: state.effective_config_path()?,
        database: state.config.database_path()?,
        downloads: state.config.general.download_dir.clone(),
    })
}
