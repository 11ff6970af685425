//! Page fetching with automatic headless fallback.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::fetch::HttpFetcher;
use crate::traits::Renderer;

/// A fetched page and how it was obtained. `rendered` tells the extractor
/// whether a headless retry could still produce different markup.
pub struct FetchedPage {
    pub html: String,
    pub rendered: bool,
}

/// Fetches pages statically where possible and through the headless browser
/// where necessary. Known JavaScript-only domains skip the static attempt;
/// everything else gets one static try with a headless fallback on failure.
#[derive(Clone)]
pub struct PageFetcher {
    http: HttpFetcher,
    renderer: Arc<dyn Renderer>,
    js_required_domains: Vec<String>,
}

impl PageFetcher {
    pub fn new(
        http: HttpFetcher,
        renderer: Arc<dyn Renderer>,
        js_required_domains: Vec<String>,
    ) -> Self {
        Self {
            http,
            renderer,
            js_required_domains,
        }
    }

    fn requires_js(&self, url: &str) -> bool {
        self.js_required_domains
            .iter()
            .any(|domain| url.contains(domain.as_str()))
    }

    /// Fetch a page. Returns `None` when both the static fetch and the
    /// headless fallback fail.
    pub async fn fetch(&self, url: &str) -> Option<FetchedPage> {
        if self.requires_js(url) {
            debug!(url, "domain needs JavaScript, using headless browser");
            return self.render(url).await;
        }
        match self.http.get_text(url).await {
            Ok(html) => Some(FetchedPage {
                html,
                rendered: false,
            }),
            Err(err) => {
                warn!(url, error = %err, "static fetch failed, falling back to headless browser");
                self.render(url).await
            }
        }
    }

    /// Fetch a page through the headless browser unconditionally.
    pub async fn render(&self, url: &str) -> Option<FetchedPage> {
        match self.renderer.render(url).await {
            Ok(html) => Some(FetchedPage {
                html,
                rendered: true,
            }),
            Err(err) => {
                warn!(url, error = %err, "headless fetch failed");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockRenderer;
    use std::time::Duration;

    fn fetcher(renderer: MockRenderer, domains: Vec<String>) -> PageFetcher {
        PageFetcher::new(
            HttpFetcher::new(Duration::from_secs(1)).unwrap(),
            Arc::new(renderer),
            domains,
        )
    }

    #[tokio::test]
    async fn test_js_domain_goes_straight_to_renderer() {
        let renderer = MockRenderer::new().with_page(
            "https://www.kindaling.de/veranstaltungen",
            "<html><body>app</body></html>",
        );
        let fetcher = fetcher(renderer, vec!["kindaling.de".to_string()]);

        let page = fetcher
            .fetch("https://www.kindaling.de/veranstaltungen")
            .await
            .unwrap();
        assert!(page.rendered);
        assert!(page.html.contains("app"));
    }

    #[tokio::test]
    async fn test_static_failure_falls_back_to_renderer() {
        // Not a real URL, so the static fetch fails immediately.
        let renderer = MockRenderer::new().with_page("broken", "<html>rendered</html>");
        let fetcher = fetcher(renderer, Vec::new());

        let page = fetcher.fetch("broken").await.unwrap();
        assert!(page.rendered);
    }

    #[tokio::test]
    async fn test_both_paths_failing_yields_none() {
        let fetcher = fetcher(MockRenderer::new(), Vec::new());
        assert!(fetcher.fetch("broken").await.is_none());
    }
}
