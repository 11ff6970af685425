//! Test doubles and fixture builders, shared between unit and
//! integration tests. Not part of the public scraping API.

use std::collections::{HashMap, VecDeque};
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use llm_client::LlmError;

use crate::config::ScraperConfig;
use crate::dedup;
use crate::error::{Result, ScrapeError};
use crate::extract::dates::parse_llm_datetime;
use crate::traits::{Completion, CompletionRequest, LanguageModel, Renderer, VisionRequest};
use crate::types::{Event, EventCategory, Location, Source, UNKNOWN};

/// A config with fixed values, independent of the environment.
pub fn test_config() -> ScraperConfig {
    ScraperConfig {
        openai_api_key: None,
        openai_base_url: None,
        text_model: "gpt-4o-mini".to_string(),
        vision_model: "gpt-4o".to_string(),
        http_timeout: Duration::from_secs(5),
        render_timeout: Duration::from_secs(5),
        settle_delay: Duration::from_millis(0),
        max_iframes: 3,
        max_content_length: 15_000,
        date_window_days: 45,
        geocoding_enabled: true,
        geocoding_min_delay: Duration::from_millis(1100),
        geocoding_timeout: Duration::from_secs(5),
        geocoding_user_agent: "kiezkalender/1.0".to_string(),
        geocoding_base_url: "https://nominatim.openstreetmap.org/search".to_string(),
        venue_cache_path: PathBuf::from("venue_cache.json"),
        geocode_cache_path: PathBuf::from("geocode_cache.json"),
        store_path: PathBuf::from("store.json"),
        region: "hamburg".to_string(),
        js_required_domains: Vec::new(),
    }
}

/// A pending HTML-mode source rooted at `https://theater.test/`.
pub fn sample_source(name: &str) -> Source {
    Source::new(name, "https://theater.test/")
}

/// An event with its fingerprint id already assigned. `start` takes the
/// ISO shapes [`parse_llm_datetime`] accepts.
pub fn sample_event(title: &str, start: &str, location_name: &str) -> Event {
    let date_start = parse_llm_datetime(start).unwrap();
    let mut event = Event {
        id: None,
        source_id: None,
        title: title.to_string(),
        description: format!("{title} im {location_name}"),
        date_start,
        date_end: None,
        location: Location::with_unknown_address(location_name),
        category: EventCategory::Theater,
        is_indoor: true,
        age_suitability: "4+".to_string(),
        price_info: UNKNOWN.to_string(),
        original_link: "https://theater.test/tickets".to_string(),
        region: "hamburg".to_string(),
    };
    event.id = Some(dedup::fingerprint(&event));
    event
}

/// Renderer serving canned pages and screenshots; anything without a
/// fixture fails like a dead browser would.
#[derive(Default)]
pub struct MockRenderer {
    pages: HashMap<String, String>,
    screenshots: HashMap<String, Vec<u8>>,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_page(mut self, url: &str, html: &str) -> Self {
        self.pages.insert(url.to_string(), html.to_string());
        self
    }

    pub fn with_screenshot(mut self, url: &str, png: Vec<u8>) -> Self {
        self.screenshots.insert(url.to_string(), png);
        self
    }
}

#[async_trait]
impl Renderer for MockRenderer {
    async fn render(&self, url: &str) -> Result<String> {
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::Render(format!("no page fixture for {url}")))
    }

    async fn screenshot(&self, url: &str) -> Result<Vec<u8>> {
        self.screenshots
            .get(url)
            .cloned()
            .ok_or_else(|| ScrapeError::Render(format!("no screenshot fixture for {url}")))
    }
}

enum MockReply {
    Text(Completion),
    Error(String),
}

/// Language model replaying scripted replies in order, shared between
/// text and vision calls, and recording every request it sees.
#[derive(Default)]
pub struct MockLanguageModel {
    replies: Mutex<VecDeque<MockReply>>,
    completions: Mutex<Vec<CompletionRequest>>,
    visions: Mutex<Vec<VisionRequest>>,
}

impl MockLanguageModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_completion(self, text: &str, tokens_used: u32) -> Self {
        self.replies.lock().unwrap().push_back(MockReply::Text(Completion {
            text: text.to_string(),
            tokens_used,
        }));
        self
    }

    pub fn with_error(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push_back(MockReply::Error(message.to_string()));
        self
    }

    pub fn completion_calls(&self) -> usize {
        self.completions.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.completions.lock().unwrap().clone()
    }

    pub fn vision_calls(&self) -> usize {
        self.visions.lock().unwrap().len()
    }

    pub fn vision_requests(&self) -> Vec<VisionRequest> {
        self.visions.lock().unwrap().clone()
    }

    fn next_reply(&self) -> Result<Completion> {
        match self.replies.lock().unwrap().pop_front() {
            Some(MockReply::Text(completion)) => Ok(completion),
            Some(MockReply::Error(message)) => Err(ScrapeError::Llm(LlmError::Api(message))),
            None => Err(ScrapeError::Llm(LlmError::Api(
                "no scripted reply left".to_string(),
            ))),
        }
    }
}

#[async_trait]
impl LanguageModel for MockLanguageModel {
    async fn complete(&self, request: CompletionRequest) -> Result<Completion> {
        self.completions.lock().unwrap().push(request);
        self.next_reply()
    }

    async fn complete_vision(&self, request: VisionRequest) -> Result<Completion> {
        self.visions.lock().unwrap().push(request);
        self.next_reply()
    }
}
