//! Error types shared across the harvest crates.

use thiserror::Error;

/// Errors raised while building core values such as site kinds and keys.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Configuration could not be loaded or is invalid
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Site name outside the supported set
    #[error("unknown site '{name}', expected one of: smth, tc, mfw, img")]
    UnknownSite {
        /// Name as given by the caller
        name: String,
    },

    /// Key text is empty or whitespace
    #[error("dedup key must not be empty")]
    EmptyKey,

    /// Key built from zero identity fields
    #[error("dedup key needs at least one identity field")]
    MissingKeyParts,

    /// One identity field of a composite key is blank
    #[error("dedup key identity field #{index} is empty")]
    BlankKeyPart {
        /// Position of the blank field
        index: usize,
    },
}

/// Errors of loading or validating `AppConfig`.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// No home or XDG directory to derive default paths from
    #[error("could not determine config directory (XDG base directories not available)")]
    NoConfigDir,

    /// Explicit config file is missing
    #[error("config file not found at {path}")]
    NotFound {
        /// Path that was requested
        path: String,
    },

    /// Config file is not valid TOML for `AppConfig`
    #[error("failed to parse config TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Reading the config file failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A field holds a value the pipeline cannot run with
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue {
        /// Dotted field path, e.g. `sites.tc.url`
        field: String,
        /// What is wrong with it
        reason: String,
    },
}

/// Result type alias using `HarvestError`.
pub type Result<T> = std::result::Result<T, HarvestError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;
