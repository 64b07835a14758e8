//! In-memory fetcher for tests and offline development.

use crate::client::{FetchedPage, Fetcher};
use crate::error::{FetchError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

/// [`Fetcher`] serving canned responses.
///
/// Unknown URLs answer 404. Every request is recorded so tests can assert
/// on what was fetched.
#[derive(Debug, Default)]
pub struct StaticFetcher {
    pages: HashMap<String, (String, String)>,
    bytes: HashMap<String, Vec<u8>>,
    failing: HashMap<String, u16>,
    requests: Mutex<Vec<String>>,
}

impl StaticFetcher {
    /// Create a fetcher with no routes.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `body` for `url`.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, body: impl Into<String>) -> Self {
        let url = url.into();
        self.pages.insert(url.clone(), (url, body.into()));
        self
    }

    /// Serve `body` for `url` as if the server redirected to `final_url`.
    #[must_use]
    pub fn with_redirect(
        mut self,
        url: impl Into<String>,
        final_url: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        self.pages
            .insert(url.into(), (final_url.into(), body.into()));
        self
    }

    /// Serve binary content for `url`.
    #[must_use]
    pub fn with_bytes(mut self, url: impl Into<String>, bytes: Vec<u8>) -> Self {
        self.bytes.insert(url.into(), bytes);
        self
    }

    /// Answer `url` with an error status.
    #[must_use]
    pub fn with_status(mut self, url: impl Into<String>, status: u16) -> Self {
        self.failing.insert(url.into(), status);
        self
    }

    /// URLs requested so far, in request order.
    #[must_use]
    pub fn requests(&self) -> Vec<String> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn record(&self, url: &str) -> Result<()> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(url.to_string());

        match self.failing.get(url) {
            Some(&status) => Err(FetchError::Status {
                url: url.to_string(),
                status,
            }),
            None => Ok(()),
        }
    }

    fn not_found(url: &str) -> FetchError {
        FetchError::Status {
            url: url.to_string(),
            status: 404,
        }
    }
}

#[async_trait]
impl Fetcher for StaticFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedPage> {
        self.record(url)?;
        let (final_url, body) = self.pages.get(url).ok_or_else(|| Self::not_found(url))?;

        Ok(FetchedPage {
            url: url.to_string(),
            final_url: final_url.clone(),
            status: 200,
            body: body.clone(),
        })
    }

    async fn fetch_bytes(&self, url: &str) -> Result<Vec<u8>> {
        self.record(url)?;
        self.bytes
            .get(url)
            .cloned()
            .ok_or_else(|| Self::not_found(url))
    }
}
