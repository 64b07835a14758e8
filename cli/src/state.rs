//! Application state management.

use anyhow::Context;
use harvest_core::AppConfig;
use harvest_db::Database;
use std::path::{Path, PathBuf};

/// Configuration and paths shared by every command.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Loaded configuration, environment overrides applied
    pub config: AppConfig,
    /// Config file given on the command line, if any
    pub config_path: Option<PathBuf>,
}

impl AppState {
    /// Load configuration from `config_path` or the default location.
    pub fn load(config_path: Option<&Path>) -> anyhow::Result<Self> {
        let config = AppConfig::load_with_env(config_path).context("failed to load configuration")?;
        Ok(Self::new(config, config_path.map(Path::to_path_buf)))
    }

    /// Wrap an already loaded configuration.
    #[must_use]
    pub fn new(config: AppConfig, config_path: Option<PathBuf>) -> Self {
        Self {
            config,
            config_path,
        }
    }

    /// Path of the config file in effect.
    pub fn effective_config_path(&self) -> anyhow::Result<PathBuf> {
        match &self.config_path {
            Some(path) => Ok(path.clone()),
            None => AppConfig::config_path().context("cannot determine config directory"),
        }
    }

    /// Open the dedup and run-history database, migrating it if needed.
    pub async fn open_database(&self) -> anyhow::Result<Database> {
        let path = self
            .config
            .database_path()
            .context("cannot determine data directory")?;
        tracing::debug!("Opening database at {}", path.display());

        let db = Database::new(&path)
            .await
            .with_context(|| format!("failed to open database {}", path.display()))?;
        db.run_migrations()
            .await
            .context("failed to migrate database")?;
        Ok(db)
    }
}
