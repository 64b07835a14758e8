//! Per-run view of a site: its fixed behaviour plus the configured settings.

use crate::definition::{self, CountPolicy, SiteSpec};
use crate::error::{Result, SiteError};
use crate::extractor::Extractor;
use harvest_core::{AppConfig, Delimiter, SiteConfig, SiteKind};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;
use url::Url;

/// Everything the pipeline needs to know about the site it runs against.
///
/// Built once from configuration and never changed during a run.
#[derive(Clone)]
pub struct SiteProfile {
    /// Fixed site behaviour
    pub spec: &'static SiteSpec,
    /// Page URL template
    pub template: String,
    /// Behaviour when the page count cannot be read
    pub count_policy: CountPolicy,
    /// Filter settings for this site
    pub settings: SiteConfig,
    /// Directory the export (and any assets) are written to
    pub output_dir: PathBuf,
    /// Remove previous output before writing
    pub clean_output: bool,
    /// Upper bound on pages processed at once, if any
    pub max_concurrent_pages: Option<usize>,
    /// Ceiling on the planned page count
    pub max_pages: u32,
    /// Extractor for this site's documents
    pub extractor: Arc<dyn Extractor>,
}

impl SiteProfile {
    /// Build the profile of `kind` from the loaded configuration.
    ///
    /// # Errors
    /// Returns error if the configured page template is not a usable URL.
    pub fn from_config(config: &AppConfig, kind: SiteKind) -> Result<Self> {
        Self::from_config_with_template(config, kind, None)
    }

    /// Build the profile of `kind`, replacing the configured page template
    /// when `template` is given (e.g. from the command line).
    ///
    /// # Errors
    /// Returns error if the template in effect is not a usable URL.
    pub fn from_config_with_template(
        config: &AppConfig,
        kind: SiteKind,
        template: Option<&str>,
    ) -> Result<Self> {
        let settings = config.site(kind);
        let template = template.map_or_else(|| settings.url.clone(), str::to_string);
        validate_template(kind, &template)?;

        let profile = Self {
            spec: definition::spec(kind),
            template,
            count_policy: CountPolicy::from_fallback(settings.default_total_pages),
            output_dir: config.general.download_dir.join(kind.as_str()),
            clean_output: config.general.clean_download_dir,
            max_concurrent_pages: config.general.max_concurrent_pages,
            max_pages: config.general.max_pages,
            extractor: definition::extractor(kind),
            settings,
        };

        debug!(site = %kind, template = %profile.template, "built site profile");
        Ok(profile)
    }

    /// Site kind.
    #[must_use]
    pub fn kind(&self) -> SiteKind {
        self.spec.kind
    }

    /// Export column separator.
    #[must_use]
    pub fn delimiter(&self) -> Delimiter {
        self.settings.delimiter
    }
}

impl fmt::Debug for SiteProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SiteProfile")
            .field("spec", &self.spec)
            .field("template", &self.template)
            .field("count_policy", &self.count_policy)
            .field("output_dir", &self.output_dir)
            .field("clean_output", &self.clean_output)
            .field("max_concurrent_pages", &self.max_concurrent_pages)
            .field("max_pages", &self.max_pages)
            .finish_non_exhaustive()
    }
}

/// Check that a template names an http(s) location.
///
/// Placeholder syntax is the planner's concern; here any placeholder is
/// replaced by `1` before parsing.
fn validate_template(kind: SiteKind, template: &str) -> Result<()> {
    let invalid = |reason: String| SiteError::InvalidTemplate {
        site: kind.to_string(),
        reason,
    };

    if template.trim().is_empty() {
        return Err(invalid("template is empty".to_string()));
    }

    let sample = template.replace("%d", "1").replace("{page}", "1");
    let url = Url::parse(&sample).map_err(|e| invalid(e.to_string()))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
    }

    Ok(())
}
