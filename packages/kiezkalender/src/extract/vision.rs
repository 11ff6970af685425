//! Screenshot extraction for sources whose markup is hostile to text
//! extraction (canvas calendars, image-heavy pages, embedded sheets).

use std::sync::Arc;
use std::time::Duration;

use chrono::Datelike;
use scraper::{Html, Selector};
use tracing::{debug, info, warn};

use crate::extract::dates::berlin_today;
use crate::extract::prompts::{format_vision_system_prompt, format_vision_user_prompt};
use crate::extract::response::parse_vision_payload;
use crate::extract::semantic::Extraction;
use crate::fetch::HttpFetcher;
use crate::traits::{LanguageModel, Renderer, VisionRequest};
use crate::types::Source;
use crate::urls::absolutize;

/// Vision extraction only covers the near future; the model cannot be
/// trusted to bound recall itself, so results are filtered to this window.
pub const VISION_WINDOW_DAYS: i64 = 14;

const SHEET_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

pub struct VisionExtractor {
    llm: Arc<dyn LanguageModel>,
    renderer: Arc<dyn Renderer>,
    http: HttpFetcher,
}

impl VisionExtractor {
    pub fn new(llm: Arc<dyn LanguageModel>, renderer: Arc<dyn Renderer>, http: HttpFetcher) -> Self {
        Self { llm, renderer, http }
    }

    /// Screenshot `url` (or an embedded published sheet, which renders more
    /// reliably than its host page) and extract events from the image.
    /// Never fails; any error degrades to zero events.
    pub async fn extract(&self, source: &Source, url: &str) -> Extraction {
        let shot_url = match self.find_published_sheet(url).await {
            Some(sheet_url) => {
                info!(url, sheet_url = %sheet_url, "screenshotting embedded sheet instead of page");
                sheet_url
            }
            None => url.to_string(),
        };

        let screenshot = match self.renderer.screenshot(&shot_url).await {
            Ok(png) => png,
            Err(err) => {
                warn!(url = %shot_url, error = %err, "screenshot failed, no events");
                return Extraction::default();
            }
        };

        let today = berlin_today();
        let window_end = today + chrono::Duration::days(VISION_WINDOW_DAYS);
        let request = VisionRequest::new(
            format_vision_system_prompt(today.year()),
            format_vision_user_prompt(&shot_url, today, window_end, source.scraping_hints.as_deref()),
            screenshot,
        );

        let completion = match self.llm.complete_vision(request).await {
            Ok(completion) => completion,
            Err(err) => {
                warn!(source = %source.name, error = %err, "vision call failed, no events");
                return Extraction::default();
            }
        };

        let mut events = parse_vision_payload(&completion.text, source, url);
        let before = events.len();
        events.retain(|event| {
            let date = event.date_start.date_naive();
            date >= today && date <= window_end
        });
        if events.len() < before {
            debug!(
                source = %source.name,
                dropped = before - events.len(),
                "dropped vision events outside the date window"
            );
        }
        info!(source = %source.name, events = events.len(), "vision extraction parsed");
        Extraction {
            events,
            tokens_used: completion.tokens_used,
        }
    }

    /// Probe the page markup for an embedded published Google Sheet.
    async fn find_published_sheet(&self, url: &str) -> Option<String> {
        let html = self
            .http
            .get_text_with_timeout(url, SHEET_PROBE_TIMEOUT)
            .await
            .ok()?;
        find_sheet_iframe(&html, url)
    }
}

/// First iframe pointing at a *published* Google Sheet, resolved to an
/// absolute URL. Unpublished sheet embeds are useless for screenshots.
fn find_sheet_iframe(html: &str, base_url: &str) -> Option<String> {
    let document = Html::parse_document(html);
    let selector = Selector::parse("iframe[src]").ok()?;
    for element in document.select(&selector) {
        let Some(src) = element.value().attr("src") else {
            continue;
        };
        if !src.contains("docs.google.com/spreadsheets") {
            continue;
        }
        let resolved = if let Some(stripped) = src.strip_prefix("//") {
            format!("https://{stripped}")
        } else if src.starts_with('/') {
            absolutize(base_url, src)
        } else {
            src.to_string()
        };
        if resolved.contains("/pub?") || resolved.contains("/pubhtml") {
            return Some(resolved);
        }
    }
    None
}
