//! Headless browser abstraction.

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Renderer: Send + Sync {
    /// Load `url` with JavaScript enabled and return the settled DOM.
    async fn render(&self, url: &str) -> Result<String>;

    /// Load `url` and capture a full-page PNG screenshot.
    async fn screenshot(&self, url: &str) -> Result<Vec<u8>>;
}
