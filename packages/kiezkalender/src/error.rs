//! Typed errors for the scraping pipeline.
//!
//! Uses `thiserror` for library errors (not `anyhow`) so callers can
//! match on failure classes.

use thiserror::Error;

/// Errors that can occur while scraping a source.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// Static HTTP fetch failed
    #[error("fetch failed: {0}")]
    Fetch(String),

    /// Headless browser failed to load or capture a page
    #[error("render failed: {0}")]
    Render(String),

    /// Language model call failed
    #[error("llm error: {0}")]
    Llm(#[from] llm_client::LlmError),

    /// JSON parsing error
    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    /// Geocoding lookup failed
    #[error("geocoding error: {0}")]
    Geocode(String),

    /// Storage operation failed
    #[error("storage error: {0}")]
    Storage(String),

    /// Configuration error
    #[error("config error: {0}")]
    Config(String),
}

/// Result type alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ScrapeError>;
