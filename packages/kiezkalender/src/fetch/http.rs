//! Plain HTTP fetching.

use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use crate::error::{Result, ScrapeError};

/// Some calendar sites refuse requests without a browser user agent.
pub const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// HTTP client with browser-like headers for static pages and embedded
/// documents (iframes, published spreadsheets).
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()
            .map_err(|e| ScrapeError::Fetch(e.to_string()))?;
        Ok(Self { client })
    }

    /// GET a URL and return the body on a 2xx status.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| ScrapeError::Fetch(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch(format!("{url}: status {status}")));
        }
        let body = response
            .text()
            .await
            .map_err(|e| ScrapeError::Fetch(format!("{url}: {e}")))?;
        debug!(url, bytes = body.len(), "fetched");
        Ok(body)
    }

    /// GET with a tighter deadline than the client default.
    pub async fn get_text_with_timeout(&self, url: &str, timeout: Duration) -> Result<String> {
        let response = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(|e| ScrapeError::Fetch(format!("{url}: {e}")))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ScrapeError::Fetch(format!("{url}: status {status}")));
        }
        response
            .text()
            .await
            .map_err(|e| ScrapeError::Fetch(format!("{url}: {e}")))
    }
}
