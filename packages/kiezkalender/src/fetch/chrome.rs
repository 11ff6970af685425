//! Headless Chrome rendering via chromiumoxide.
//!
//! Each call launches a fresh browser, loads one page and tears everything
//! down again. Scrapes are minutes apart, so browser reuse buys nothing and
//! a crashed renderer never poisons the next source.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::cdp::browser_protocol::page::CaptureScreenshotFormat;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracing::{debug, warn};

use crate::config::ScraperConfig;
use crate::error::{Result, ScrapeError};
use crate::traits::Renderer;

const WINDOW_WIDTH: u32 = 1920;
const WINDOW_HEIGHT: u32 = 1080;
const SCROLL_DELAY: Duration = Duration::from_millis(1000);
const SCROLL_BACK_DELAY: Duration = Duration::from_millis(500);

pub struct ChromeRenderer {
    render_timeout: Duration,
    settle_delay: Duration,
}

impl ChromeRenderer {
    pub fn from_config(config: &ScraperConfig) -> Self {
        Self {
            render_timeout: config.render_timeout,
            settle_delay: config.settle_delay,
        }
    }

    async fn launch(&self) -> Result<(Browser, JoinHandle<()>)> {
        let config = BrowserConfig::builder()
            .window_size(WINDOW_WIDTH, WINDOW_HEIGHT)
            .arg("--ignore-certificate-errors")
            .no_sandbox()
            .build()
            .map_err(ScrapeError::Render)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScrapeError::Render(e.to_string()))?;
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if event.is_err() {
                    break;
                }
            }
        });
        Ok((browser, handler_task))
    }

    async fn open(&self, browser: &Browser, url: &str) -> Result<Page> {
        let page = browser
            .new_page(url)
            .await
            .map_err(|e| ScrapeError::Render(format!("{url}: {e}")))?;
        page.wait_for_navigation()
            .await
            .map_err(|e| ScrapeError::Render(format!("{url}: {e}")))?;
        sleep(self.settle_delay).await;
        // Bottom scroll triggers lazy-loaded calendar widgets.
        page.evaluate("window.scrollTo(0, document.body.scrollHeight)")
            .await
            .map_err(|e| ScrapeError::Render(e.to_string()))?;
        sleep(SCROLL_DELAY).await;
        Ok(page)
    }

    async fn load_html(&self, browser: &Browser, url: &str) -> Result<String> {
        let page = self.open(browser, url).await?;
        let html = page
            .content()
            .await
            .map_err(|e| ScrapeError::Render(e.to_string()))?;
        close_page(page).await;
        Ok(html)
    }

    async fn capture_png(&self, browser: &Browser, url: &str) -> Result<Vec<u8>> {
        let page = self.open(browser, url).await?;
        // Back to the top so the full-page capture starts at the header.
        page.evaluate("window.scrollTo(0, 0)")
            .await
            .map_err(|e| ScrapeError::Render(e.to_string()))?;
        sleep(SCROLL_BACK_DELAY).await;
        let bytes = page
            .screenshot(
                ScreenshotParams::builder()
                    .format(CaptureScreenshotFormat::Png)
                    .full_page(true)
                    .build(),
            )
            .await
            .map_err(|e| ScrapeError::Render(e.to_string()))?;
        close_page(page).await;
        Ok(bytes)
    }
}

async fn close_page(page: Page) {
    if let Err(err) = page.close().await {
        warn!(error = %err, "failed to close page");
    }
}

async fn shutdown(mut browser: Browser, handler_task: JoinHandle<()>) {
    if let Err(err) = browser.close().await {
        warn!(error = %err, "failed to close browser");
    }
    if let Err(err) = browser.wait().await {
        warn!(error = %err, "failed to reap browser process");
    }
    handler_task.abort();
}

#[async_trait]
impl Renderer for ChromeRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        debug!(url, "rendering with headless browser");
        let (browser, handler_task) = self.launch().await?;
        // The deadline covers the page load only; teardown always runs so a
        // hung page never leaks a Chrome process.
        let result = timeout(self.render_timeout, self.load_html(&browser, url)).await;
        shutdown(browser, handler_task).await;
        match result {
            Ok(html) => html,
            Err(_) => Err(ScrapeError::Render(format!("{url}: render timed out"))),
        }
    }

    async fn screenshot(&self, url: &str) -> Result<Vec<u8>> {
        debug!(url, "taking full-page screenshot");
        let (browser, handler_task) = self.launch().await?;
        let result = timeout(self.render_timeout, self.capture_png(&browser, url)).await;
        shutdown(browser, handler_task).await;
        match result {
            Ok(bytes) => bytes,
            Err(_) => Err(ScrapeError::Render(format!("{url}: screenshot timed out"))),
        }
    }
}
