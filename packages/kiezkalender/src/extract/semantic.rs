//! Text extraction: structured pass with cheap classification, full model
//! extraction as fallback.
//!
//! Never fails. Fetch errors, model errors and unparseable responses all
//! degrade to "zero events from this page"; a broken source must not abort
//! a batch run.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Datelike;
use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::extract::dates::{berlin_today, to_berlin};
use crate::extract::markdown::MarkdownConverter;
use crate::extract::prompts::{
    format_enrichment_user_prompt, format_extraction_system_prompt, format_extraction_user_prompt,
    ENRICHMENT_SYSTEM_PROMPT,
};
use crate::extract::response::{items_from_payload, parse_event_payload};
use crate::extract::structured::extract_raw_events;
use crate::fetch::{FetchedPage, PageFetcher};
use crate::traits::{CompletionRequest, LanguageModel};
use crate::types::{Event, EventCategory, Location, RawEvent, Source, UNKNOWN};

const FULL_EXTRACTION_MAX_TOKENS: u32 = 4000;
const CLASSIFICATION_MAX_TOKENS: u32 = 2000;
const EXTRACTION_TEMPERATURE: f32 = 0.1;

/// Result of one extraction run.
#[derive(Debug, Default)]
pub struct Extraction {
    pub events: Vec<Event>,
    pub tokens_used: u32,
}

/// The model's verdict on one structured raw event.
#[derive(Debug, Deserialize)]
struct ClassificationVerdict {
    index: Option<usize>,
    family_friendly: Option<bool>,
    category: Option<String>,
    description: Option<String>,
    age_suitability: Option<String>,
    is_indoor: Option<bool>,
}

pub struct SemanticExtractor {
    llm: Arc<dyn LanguageModel>,
    fetcher: PageFetcher,
    converter: MarkdownConverter,
}

impl SemanticExtractor {
    pub fn new(
        llm: Arc<dyn LanguageModel>,
        fetcher: PageFetcher,
        converter: MarkdownConverter,
    ) -> Self {
        Self {
            llm,
            fetcher,
            converter,
        }
    }

    /// Fetch `url` and extract events from it.
    pub async fn extract(&self, source: &Source, url: &str) -> Extraction {
        let Some(page) = self.fetcher.fetch(url).await else {
            warn!(url, "page could not be fetched, no events");
            return Extraction::default();
        };
        self.extract_from_page(source, url, &page).await
    }

    /// Extraction for an already fetched page.
    ///
    /// Structured schedules go through the cheap classification call first;
    /// everything else (and unproductive classifications) goes through full
    /// extraction. A statically fetched page that yields nothing is
    /// rendered with the headless browser once before giving up.
    pub async fn extract_from_page(
        &self,
        source: &Source,
        url: &str,
        page: &FetchedPage,
    ) -> Extraction {
        let mut tokens_used = 0u32;

        let raws = extract_raw_events(&page.html, url);
        if !raws.is_empty() {
            info!(
                source = %source.name,
                raw_events = raws.len(),
                "structured schedule found, classifying"
            );
            match self.classify_raw_events(source, &raws).await {
                Ok((events, tokens)) => {
                    tokens_used += tokens;
                    if !events.is_empty() {
                        return Extraction { events, tokens_used };
                    }
                    debug!(source = %source.name, "classification kept nothing, trying full extraction");
                }
                Err(err) => {
                    warn!(source = %source.name, error = %err, "classification call failed, trying full extraction");
                }
            }
        }

        let (events, tokens) = self.full_extraction(source, url, &page.html).await;
        tokens_used += tokens;
        if !events.is_empty() || page.rendered {
            return Extraction { events, tokens_used };
        }

        // The static markup may be an empty shell that fills in via JS
        info!(url, "no events from static markup, retrying with headless rendering");
        let Some(rendered) = self.fetcher.render(url).await else {
            return Extraction { events, tokens_used };
        };
        let (events, tokens) = self.full_extraction(source, url, &rendered.html).await;
        tokens_used += tokens;
        Extraction { events, tokens_used }
    }

    /// One model call that filters and categorizes all raw events at once.
    async fn classify_raw_events(
        &self,
        source: &Source,
        raws: &[RawEvent],
    ) -> crate::error::Result<(Vec<Event>, u32)> {
        let event_list = raws
            .iter()
            .enumerate()
            .map(|(i, raw)| {
                let mut line = format!("{}. {} ({} Termine)", i + 1, raw.title, raw.dates.len());
                if let Some(hint) = &raw.description_hint {
                    line.push_str(&format!(" - {hint}"));
                }
                line
            })
            .collect::<Vec<_>>()
            .join("\n");

        let request = CompletionRequest::new(format_enrichment_user_prompt(&source.name, &event_list))
            .with_system(ENRICHMENT_SYSTEM_PROMPT)
            .with_max_tokens(CLASSIFICATION_MAX_TOKENS)
            .with_temperature(EXTRACTION_TEMPERATURE);
        let completion = self.llm.complete(request).await?;
        let verdicts = parse_verdicts(&completion.text);
        Ok((
            explode_raw_events(raws, &verdicts, source),
            completion.tokens_used,
        ))
    }

    async fn full_extraction(&self, source: &Source, url: &str, html: &str) -> (Vec<Event>, u32) {
        let view = self.converter.page_view(url, html).await;
        let request = CompletionRequest::new(format_extraction_user_prompt(
            &source.name,
            url,
            &view.markdown,
            &view.link_inventory,
            source.scraping_hints.as_deref(),
        ))
        .with_system(format_extraction_system_prompt(berlin_today().year()))
        .with_max_tokens(FULL_EXTRACTION_MAX_TOKENS)
        .with_temperature(EXTRACTION_TEMPERATURE);

        match self.llm.complete(request).await {
            Ok(completion) => {
                let events = parse_event_payload(&completion.text, source, url);
                info!(source = %source.name, events = events.len(), "full extraction parsed");
                (events, completion.tokens_used)
            }
            Err(err) => {
                warn!(source = %source.name, error = %err, "extraction call failed");
                (Vec::new(), 0)
            }
        }
    }
}

fn parse_verdicts(raw: &str) -> HashMap<usize, ClassificationVerdict> {
    let mut verdicts = HashMap::new();
    for value in items_from_payload(raw) {
        match serde_json::from_value::<ClassificationVerdict>(value) {
            Ok(verdict) => {
                if let Some(index) = verdict.index {
                    verdicts.insert(index, verdict);
                }
            }
            Err(err) => warn!(error = %err, "skipping malformed classification item"),
        }
    }
    verdicts
}

/// Turn accepted raw events into one event per date, reusing the verdict's
/// category and description for every instance. Raw events without a
/// verdict stay unconfirmed and are dropped.
fn explode_raw_events(
    raws: &[RawEvent],
    verdicts: &HashMap<usize, ClassificationVerdict>,
    source: &Source,
) -> Vec<Event> {
    let mut events = Vec::new();
    for (i, raw) in raws.iter().enumerate() {
        let Some(verdict) = verdicts.get(&(i + 1)) else {
            debug!(title = %raw.title, "no verdict for raw event, dropping");
            continue;
        };
        if !verdict.family_friendly.unwrap_or(true) {
            debug!(title = %raw.title, "not family friendly, dropping");
            continue;
        }
        let description = verdict
            .description
            .clone()
            .filter(|d| !d.trim().is_empty())
            .or_else(|| raw.description_hint.clone())
            .unwrap_or_default();
        let venue = raw
            .location_hint
            .clone()
            .unwrap_or_else(|| source.name.clone());
        for (date, link) in raw.dates.iter().zip(&raw.links) {
            let Some(date_start) = to_berlin(*date) else {
                continue;
            };
            events.push(Event {
                id: None,
                source_id: source.id,
                title: raw.title.clone(),
                description: description.clone(),
                date_start,
                date_end: None,
                location: Location::with_unknown_address(venue.clone()),
                category: EventCategory::parse_or_default(
                    verdict.category.as_deref().unwrap_or(""),
                ),
                is_indoor: verdict.is_indoor.unwrap_or(true),
                age_suitability: verdict
                    .age_suitability
                    .clone()
                    .filter(|a| !a.trim().is_empty())
                    .unwrap_or_else(|| "4+".to_string()),
                price_info: UNKNOWN.to_string(),
                original_link: link.clone(),
                region: source.region.clone(),
            });
        }
    }
    events
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScraperConfig;
    use crate::fetch::HttpFetcher;
    use crate::testing::{sample_source, test_config, MockLanguageModel, MockRenderer};
    use crate::traits::Renderer;

    const URL: &str = "https://theater.test/spielplan";

    const SCHEDULE_HTML: &str = r#"<html><body><main>
        <h2>Ritter Rost</h2>
        <ul>
            <li><a href="/t/1">06.02.2026 15:00</a></li>
            <li><a href="/t/2">07.02.2026 15:00</a></li>
        </ul>
        <p>Ein musikalisches Abenteuer rund um den rostigsten Ritter des Landes.</p>
    </main></body></html>"#;

    fn extractor(llm: Arc<MockLanguageModel>, renderer: MockRenderer) -> SemanticExtractor {
        let mut config: ScraperConfig = test_config();
        config.js_required_domains = vec!["theater.test".to_string()];
        let http = HttpFetcher::new(config.http_timeout).unwrap();
        let renderer: Arc<dyn Renderer> = Arc::new(renderer);
        let fetcher = PageFetcher::new(http.clone(), renderer, config.js_required_domains.clone());
        let converter = MarkdownConverter::new(&config, fetcher.clone(), http);
        SemanticExtractor::new(llm, fetcher, converter)
    }

    #[tokio::test]
    async fn test_structured_schedule_is_classified_cheaply() {
        let renderer = MockRenderer::new().with_page(URL, SCHEDULE_HTML);
        let llm = Arc::new(MockLanguageModel::new().with_completion(
            r#"[{"index": 1, "family_friendly": true, "category": "theater",
                 "description": "Musiktheater", "age_suitability": "5+", "is_indoor": true}]"#,
            150,
        ));
        let source = sample_source("Fundus Theater");

        let extraction = extractor(llm.clone(), renderer).extract(&source, URL).await;

        assert_eq!(extraction.events.len(), 2);
        assert_eq!(extraction.tokens_used, 150);
        let event = &extraction.events[0];
        assert_eq!(event.title, "Ritter Rost");
        assert_eq!(event.description, "Musiktheater");
        assert_eq!(event.age_suitability, "5+");
        assert_eq!(event.location.name, "Fundus Theater");
        assert_eq!(event.location.address, "Unbekannt");
        assert_eq!(event.original_link, "https://theater.test/t/1");
        assert_eq!(extraction.events[1].original_link, "https://theater.test/t/2");
        assert_eq!(llm.completion_calls(), 1);
    }

    #[tokio::test]
    async fn test_rejected_classification_falls_back_to_full_extraction() {
        let renderer = MockRenderer::new().with_page(URL, SCHEDULE_HTML);
        let llm = Arc::new(
            MockLanguageModel::new()
                .with_completion(r#"[{"index": 1, "family_friendly": false}]"#, 80)
                .with_completion("[]", 40),
        );
        let source = sample_source("Fundus Theater");

        let extraction = extractor(llm.clone(), renderer).extract(&source, URL).await;

        assert!(extraction.events.is_empty());
        assert_eq!(extraction.tokens_used, 120);
        assert_eq!(llm.completion_calls(), 2);
    }

    #[tokio::test]
    async fn test_unstructured_page_goes_straight_to_full_extraction() {
        let html = "<html><body><main><p>Unser Februarprogramm steht jetzt online!</p></main></body></html>";
        let renderer = MockRenderer::new().with_page(URL, html);
        let llm = Arc::new(MockLanguageModel::new().with_completion(
            r#"[{"title": "Kinderkonzert", "date_start": "2026-02-08T11:00:00",
                 "category": "music", "location": {"name": "Zinnschmelze", "address": "Unbekannt"}}]"#,
            900,
        ));
        let source = sample_source("Zinnschmelze");

        let extraction = extractor(llm.clone(), renderer).extract(&source, URL).await;

        assert_eq!(extraction.events.len(), 1);
        assert_eq!(extraction.events[0].category, EventCategory::Music);
        assert_eq!(llm.completion_calls(), 1);
        let request = &llm.requests()[0];
        assert!(request.user.contains("Februarprogramm"));
        assert!(request.system.as_deref().unwrap().contains("KATEGORIEN"));
    }

    #[tokio::test]
    async fn test_empty_static_page_retries_with_rendering() {
        let rendered_html = "<html><body><main>\
            <p>Kinderkonzert am Sonntag</p></main></body></html>";
        let renderer = MockRenderer::new().with_page(URL, rendered_html);
        let llm = Arc::new(
            MockLanguageModel::new()
                .with_completion("[]", 30)
                .with_completion(
                    r#"[{"title": "Kinderkonzert", "date_start": "2026-02-08T11:00:00"}]"#,
                    700,
                ),
        );
        let source = sample_source("Zinnschmelze");
        let static_page = FetchedPage {
            html: "<html><body><main><p>Bitte JavaScript aktivieren.</p></main></body></html>"
                .to_string(),
            rendered: false,
        };

        let extraction = extractor(llm.clone(), MockRenderer::new())
            .extract_from_page(&source, URL, &static_page)
            .await;
        // renderer had no fixture in that run, nothing to retry with
        assert!(extraction.events.is_empty());
        assert_eq!(llm.completion_calls(), 1);

        let llm_retry = Arc::new(
            MockLanguageModel::new()
                .with_completion("[]", 30)
                .with_completion(
                    r#"[{"title": "Kinderkonzert", "date_start": "2026-02-08T11:00:00"}]"#,
                    700,
                ),
        );
        let extraction = extractor(llm_retry.clone(), renderer)
            .extract_from_page(&source, URL, &static_page)
            .await;
        assert_eq!(extraction.events.len(), 1);
        assert_eq!(extraction.tokens_used, 730);
        assert_eq!(llm_retry.completion_calls(), 2);
    }

    #[tokio::test]
    async fn test_unfetchable_page_yields_nothing() {
        let llm = Arc::new(MockLanguageModel::new());
        let source = sample_source("Fundus Theater");
        let extraction = extractor(llm.clone(), MockRenderer::new())
            .extract(&source, "https://theater.test/kaputt")
            .await;
        assert!(extraction.events.is_empty());
        assert_eq!(extraction.tokens_used, 0);
        assert_eq!(llm.completion_calls(), 0);
    }
}
