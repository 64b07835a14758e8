//! Configuration management for harvest.
//!
//! Provides TOML-based configuration with XDG-compliant paths and
//! environment variable overrides. Every site gets its own `[sites.<kind>]`
//! section holding its page template and filter policy.

use crate::error::{ConfigError, ConfigResult};
use crate::types::SiteKind;
use directories::ProjectDirs;
use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Default recency window in days.
pub const DEFAULT_RECENCY_WINDOW_DAYS: i64 = 15;

/// Default ceiling on the number of planned pages per run.
pub const DEFAULT_MAX_PAGES: u32 = 1000;

/// Main application configuration.
///
/// This is loaded from `~/.config/harvest/config.toml` (or platform equivalent).
/// If the file doesn't exist, default values are used.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// General settings: storage locations and fan-out
    pub general: GeneralConfig,
    /// HTTP client settings
    pub http: HttpConfig,
    /// Per-site settings
    pub sites: SitesConfig,
}

impl AppConfig {
    /// Load configuration from the default location, falling back to defaults
    /// if not found.
    ///
    /// # Errors
    /// Returns error if:
    /// - Config directory cannot be determined
    /// - File exists but cannot be read
    /// - File contents are not valid TOML
    pub fn load() -> ConfigResult<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            Self::load_from(&config_path)
        } else {
            tracing::debug!("Config file not found, using defaults");
            Ok(Self::default())
        }
    }

    /// Load configuration from an explicit file path.
    ///
    /// Unlike [`AppConfig::load`], a missing file is an error here: the caller
    /// asked for that file specifically.
    pub fn load_from(path: &Path) -> ConfigResult<Self> {
        if !path.exists() {
            return Err(ConfigError::NotFound {
                path: path.display().to_string(),
            });
        }

        tracing::debug!("Loading config from {}", path.display());
        let contents = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration with environment variable overrides.
    ///
    /// Supports the following environment variables:
    /// - `HARVEST_DOWNLOAD_DIR`: Override the export root directory
    /// - `HARVEST_DATA_DIR`: Override where the dedup database lives
    /// - `HARVEST_TIMEOUT_SECS`: Override the HTTP timeout
    pub fn load_with_env(path: Option<&Path>) -> ConfigResult<Self> {
        let mut config = match path {
            Some(path) => Self::load_from(path)?,
            None => Self::load()?,
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply overrides from a variable lookup (the process environment in
    /// production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(dir) = lookup("HARVEST_DOWNLOAD_DIR") {
            tracing::debug!("Override general.download_dir from env: {}", dir);
            self.general.download_dir = PathBuf::from(dir);
        }

        if let Some(dir) = lookup("HARVEST_DATA_DIR") {
            tracing::debug!("Override general.data_dir from env: {}", dir);
            self.general.data_dir = Some(PathBuf::from(dir));
        }

        if let Some(val) = lookup("HARVEST_TIMEOUT_SECS") {
            if let Ok(secs) = val.parse() {
                self.http.timeout_secs = secs;
                tracing::debug!("Override http.timeout_secs from env: {}", secs);
            }
        }
    }

    /// Check values that serde cannot check on its own.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.http.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "http.timeout_secs".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.general.max_pages == 0 {
            return Err(ConfigError::InvalidValue {
                field: "general.max_pages".to_string(),
                reason: "must be greater than zero".to_string(),
            });
        }

        if self.general.max_concurrent_pages == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "general.max_concurrent_pages".to_string(),
                reason: "must be greater than zero when set".to_string(),
            });
        }

        for kind in SiteKind::ALL {
            let site = self.site(kind);
            if site.recency_window_days < 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("sites.{kind}.recency_window_days"),
                    reason: format!("must not be negative, got {}", site.recency_window_days),
                });
            }
        }

        Ok(())
    }

    /// Settings for one site.
    ///
    /// A `[sites.<kind>]` section without `url` keeps the built-in template,
    /// if the site has one.
    #[must_use]
    pub fn site(&self, kind: SiteKind) -> SiteConfig {
        let configured = match kind {
            SiteKind::Smth => &self.sites.smth,
            SiteKind::Tc => &self.sites.tc,
            SiteKind::Mfw => &self.sites.mfw,
            SiteKind::Img => &self.sites.img,
        };
        let mut site = configured.clone();
        if site.url.trim().is_empty() {
            if let Some(url) = default_url(kind) {
                site.url = url.to_string();
            }
        }
        site
    }

    /// Path of the dedup/run-history database.
    ///
    /// Uses `general.data_dir` when set, the XDG data directory otherwise.
    pub fn database_path(&self) -> ConfigResult<PathBuf> {
        let dir = match &self.general.data_dir {
            Some(dir) => dir.clone(),
            None => Self::data_dir()?,
        };
        Ok(dir.join("harvest.db"))
    }

    /// Get the path to the configuration file.
    ///
    /// Uses XDG base directories: `~/.config/harvest/config.toml`
    pub fn config_path() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "harvest", "harvest").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.config_dir().join("config.toml"))
    }

    /// Get the data directory path.
    ///
    /// Uses XDG base directories: `~/.local/share/harvest`
    pub fn data_dir() -> ConfigResult<PathBuf> {
        let dirs = ProjectDirs::from("com", "harvest", "harvest").ok_or(ConfigError::NoConfigDir)?;
        Ok(dirs.data_dir().to_path_buf())
    }
}

/// General settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding `harvest.db`; XDG data dir when unset
    pub data_dir: Option<PathBuf>,
    /// Root directory for exports; each site writes to `<download_dir>/<site>`
    pub download_dir: PathBuf,
    /// Remove the site's previous output before writing a new one
    pub clean_download_dir: bool,
    /// Upper bound on pages fetched at once; unbounded when unset
    pub max_concurrent_pages: Option<usize>,
    /// Ceiling on the page count a site may report; larger counts are clamped
    pub max_pages: u32,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: None,
            download_dir: PathBuf::from("_dl"),
            clean_download_dir: false,
            max_concurrent_pages: None,
            max_pages: DEFAULT_MAX_PAGES,
        }
    }
}

/// HTTP client settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: "Mozilla/5.0 (X11; Linux x86_64) harvest/0.1".to_string(),
        }
    }
}

/// Settings for every supported site.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SitesConfig {
    /// newsmth.net house-rent board
    pub smth: SiteConfig,
    /// 58.com rentals
    pub tc: SiteConfig,
    /// mafengwo.cn travel notes
    pub mfw: SiteConfig,
    /// JSON image board; has no built-in template
    pub img: SiteConfig,
}

impl Default for SitesConfig {
    fn default() -> Self {
        Self {
            smth: SiteConfig::builtin(SiteKind::Smth),
            tc: SiteConfig {
                default_total_pages: Some(10),
                ..SiteConfig::builtin(SiteKind::Tc)
            },
            mfw: SiteConfig::builtin(SiteKind::Mfw),
            img: SiteConfig::builtin(SiteKind::Img),
        }
    }
}

/// Built-in page template for a site, `None` when it must be configured.
#[must_use]
pub fn default_url(kind: SiteKind) -> Option<&'static str> {
    match kind {
        SiteKind::Smth => Some("http://www.newsmth.net/nForum/board/HouseRent?ajax&p=%d"),
        SiteKind::Tc => Some("http://bj.58.com/chaoyang/hezu/0/pn%d/?minprice=1800_4000"),
        SiteKind::Mfw => Some("http://www.mafengwo.cn/yj/10176/1-0-%d.html"),
        SiteKind::Img => None,
    }
}

/// Column separator of the exported table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Delimiter {
    /// Comma-separated values
    #[default]
    Comma,
    /// Tab-separated values
    Tab,
}

impl Delimiter {
    /// The separator character.
    #[must_use]
    pub fn as_char(&self) -> char {
        match self {
            Self::Comma => ',',
            Self::Tab => '\t',
        }
    }

    /// File extension matching the separator.
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Comma => "csv",
            Self::Tab => "tsv",
        }
    }
}

/// Settings for one site: where to start and what to keep.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Page URL template with one `%d` or `{page}` placeholder
    pub url: String,
    /// Substrings that reject a record when found in its title or category
    #[serde(deserialize_with = "delimited_list")]
    pub banned_titles: Vec<String>,
    /// Authors whose records are always rejected
    #[serde(deserialize_with = "delimited_list")]
    pub banned_authors: Vec<String>,
    /// When non-empty, only records whose category is listed pass
    #[serde(deserialize_with = "delimited_list")]
    pub allowed_categories: Vec<String>,
    /// Records older than this many days are dropped
    pub recency_window_days: i64,
    /// Page count to use when the first page does not reveal one
    pub default_total_pages: Option<i64>,
    /// Records with fewer clicks are dropped; only listings that report
    /// clicks are affected
    pub min_clicks: u64,
    /// Export column separator
    pub delimiter: Delimiter,
}

impl SiteConfig {
    fn builtin(kind: SiteKind) -> Self {
        Self {
            url: default_url(kind).unwrap_or_default().to_string(),
            ..Self::default()
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            banned_titles: Vec::new(),
            banned_authors: Vec::new(),
            allowed_categories: Vec::new(),
            recency_window_days: DEFAULT_RECENCY_WINDOW_DAYS,
            default_total_pages: None,
            min_clicks: 0,
            delimiter: Delimiter::Comma,
        }
    }
}

/// Split a `|` or `,` delimited config value into trimmed, non-empty items.
#[must_use]
pub fn split_delimited(value: &str) -> Vec<String> {
    value
        .split(['|', ','])
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(str::to_string)
        .collect()
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrJoined {
    List(Vec<String>),
    Joined(String),
}

fn delimited_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListOrJoined::deserialize(deserializer)? {
        ListOrJoined::List(items) => items
            .iter()
            .map(|item| item.trim())
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
        ListOrJoined::Joined(joined) => split_delimited(&joined),
    })
}
