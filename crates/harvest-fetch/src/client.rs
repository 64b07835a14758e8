use crate::error::{FetchError, Result};
use async_trait::async_trait;
use harvest_core::HttpConfig;
use reqwest::Client;
use std::time::Duration;
use url::Url;

/// A fetched page after redirects were followed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedPage {
    /// URL that was requested
    pub url: String,
    /// URL the response actually came from
    pub final_url: String,
    /// HTTP status code
    pub status: u16,
    /// Decoded body text
    pub body: String,
}

impl FetchedPage {
    /// Whether the server sent us somewhere other than the requested URL.
    #[must_use]
    pub fn was_redirected(&self) -> bool {
        match (Url::parse(&self.url), Url::parse(&self.final_url)) {
            (Ok(requested), Ok(answered)) => requested != answered,
            _ => self.url != self.final_url,
        }
    }
}

/// Fetch collaborator used by the planner, the page workers and the asset
/// downloader.
///
/// Implementations return an error for transport failures and for any
/// non-success status, so callers only ever see pages worth parsing.
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a page as text.
    async fn fetch(&self, url: &str) -> Result<FetchedPage>;

    /// Fetch a binary resource such as an image.
    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>>;
}

/// [`Fetcher`] over a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    /// Build a fetcher with the configured timeout and user agent.
    ///
    /// # Errors
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| FetchError::Transport {
                url: String::new(),
                message: format!("failed to create HTTP client: {e}"),
            })?;

        Ok(Self { client })
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::Transport {
                url: url.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        Ok(response)
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        tracing::debug!(url, "fetching page");

        let response = self.get(url).await?;
        let status = response.status().as_u16();
        let final_url = response.url().to_string();
        let body = response.text().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url,
            status,
            body,
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        tracing::debug!(url, "fetching resource");

        let response = self.get(url).await?;
        let bytes = response.bytes().await.map_err(|e| FetchError::Body {
            url: url.to_string(),
            message: e.to_string(),
        })?;

        Ok(bytes.to_vec())
    }
}
