//! Binary asset downloads for gallery sites.
//!
//! Assets land at `<dir>/<name><suffix>`, where the name and suffix come from
//! the link URLs. Existing files are never downloaded twice.

use crate::client::Fetcher;
use crate::error::{FetchError, Result};
use std::path::{Path, PathBuf};
use url::Url;

/// What happened to one asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetOutcome {
    /// Downloaded and written
    Saved,
    /// Already present on disk
    Skipped,
}

fn last_segment(link: &str) -> Result<String> {
    let url = Url::parse(link).map_err(|_| FetchError::InvalidUrl(link.to_string()))?;
    url.path_segments()
        .and_then(|mut segments| segments.rfind(|s| !s.is_empty()))
        .map(str::to_string)
        .ok_or_else(|| FetchError::InvalidUrl(link.to_string()))
}

/// Stem of the last path segment: `http://host/i/7571.html` gives `7571`.
///
/// # Errors
/// Returns `FetchError::InvalidUrl` if the link has no usable path segment.
pub fn resource_name(link: &str) -> Result<String> {
    let segment = last_segment(link)?;
    let stem = match segment.rsplit_once('.') {
        Some((stem, _)) if !stem.is_empty() => stem,
        _ => segment.as_str(),
    };
    Ok(stem.to_string())
}

/// Extension of the last path segment including the dot, ignoring any
/// query string: `http://img/a/b.jpeg?w=300` gives `.jpeg`.
///
/// # Errors
/// Returns `FetchError::InvalidUrl` if the segment has no extension.
pub fn resource_suffix(link: &str) -> Result<String> {
    let segment = last_segment(link)?;
    match segment.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => Ok(format!(".{ext}")),
        _ => Err(FetchError::InvalidUrl(link.to_string())),
    }
}

/// Path an asset is stored under.
#[must_use]
pub fn asset_path(dir: &Path, name: &str, suffix: &str) -> PathBuf {
    dir.join(format!("{name}{suffix}"))
}

/// Sibling an asset is written to before it is renamed into place.
fn part_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

/// Download `link` into `path` unless a file is already there.
///
/// Bytes go to `<path>.part` first and are renamed over `path` only once
/// fully written, so an interrupted download never looks complete.
///
/// # Errors
/// Returns `FetchError` if the fetch fails or the file cannot be written.
pub async fn download_asset(
    fetcher: &dyn Fetcher,
    link: &str,
    path: &Path,
) -> Result<AssetOutcome> {
    if tokio::fs::try_exists(path).await? {
        tracing::debug!(path = %path.display(), "asset already present");
        return Ok(AssetOutcome::Skipped);
    }

    let bytes = fetcher.fetch_bytes(link).await?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }

    let part = part_path(path);
    if let Err(e) = tokio::fs::write(&part, &bytes).await {
        let _ = tokio::fs::remove_file(&part).await;
        return Err(e.into());
    }
    tokio::fs::rename(&part, path).await?;

    tracing::debug!(path = %path.display(), bytes = bytes.len(), "asset saved");
    Ok(AssetOutcome::Saved)
}
