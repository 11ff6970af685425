//! Scrape sources and their lifecycle state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::event::default_region;

/// Health of a source after its last scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceStatus {
    Active,
    Error,
    Pending,
}

/// How often a source should be scraped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapeStrategy {
    Weekly,
    Monthly,
}

/// Which extraction path a source uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrapingMode {
    /// Fetch the DOM and extract from text.
    Html,
    /// Screenshot the page and extract from the image.
    Vision,
}

/// What kind of listings a source carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceType {
    /// Dated events; scraped by the batch driver.
    Event,
    /// Undated activity ideas; out of scope for the event pipeline.
    Idea,
}

/// A website the pipeline scrapes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Source {
    #[serde(default)]
    pub id: Option<Uuid>,
    pub name: String,
    /// Landing page; navigation starts here.
    pub input_url: String,
    /// Discovered calendar page, reused on later runs.
    #[serde(default)]
    pub target_url: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_status")]
    pub status: SourceStatus,
    #[serde(default)]
    pub last_scraped: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_error: Option<String>,
    #[serde(default = "default_strategy")]
    pub strategy: ScrapeStrategy,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default = "default_source_type")]
    pub source_type: SourceType,
    #[serde(default = "default_mode")]
    pub scraping_mode: ScrapingMode,
    /// Free-text guidance injected into the extraction prompt.
    #[serde(default)]
    pub scraping_hints: Option<String>,
}

impl Source {
    pub fn new(name: impl Into<String>, input_url: impl Into<String>) -> Self {
        Self {
            id: None,
            name: name.into(),
            input_url: input_url.into(),
            target_url: None,
            is_active: true,
            status: SourceStatus::Pending,
            last_scraped: None,
            last_error: None,
            strategy: ScrapeStrategy::Weekly,
            region: default_region(),
            source_type: SourceType::Event,
            scraping_mode: ScrapingMode::Html,
            scraping_hints: None,
        }
    }

    pub fn with_mode(mut self, mode: ScrapingMode) -> Self {
        self.scraping_mode = mode;
        self
    }

    pub fn with_hints(mut self, hints: impl Into<String>) -> Self {
        self.scraping_hints = Some(hints.into());
        self
    }

    pub fn with_region(mut self, region: impl Into<String>) -> Self {
        self.region = region.into();
        self
    }
}

/// Partial update applied to a stored source after a scrape.
///
/// `last_error` is doubly optional so a successful run can clear it.
#[derive(Debug, Clone, Default)]
pub struct SourceUpdate {
    pub target_url: Option<String>,
    pub status: Option<SourceStatus>,
    pub last_scraped: Option<DateTime<Utc>>,
    pub last_error: Option<Option<String>>,
}

impl SourceUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn target_url(mut self, url: impl Into<String>) -> Self {
        self.target_url = Some(url.into());
        self
    }

    pub fn status(mut self, status: SourceStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn last_scraped(mut self, at: DateTime<Utc>) -> Self {
        self.last_scraped = Some(at);
        self
    }

    pub fn last_error(mut self, error: Option<String>) -> Self {
        self.last_error = Some(error);
        self
    }

    /// Apply the set fields to `source`, leaving the rest untouched.
    pub fn apply(&self, source: &mut Source) {
        if let Some(url) = &self.target_url {
            source.target_url = Some(url.clone());
        }
        if let Some(status) = self.status {
            source.status = status;
        }
        if let Some(at) = self.last_scraped {
            source.last_scraped = Some(at);
        }
        if let Some(error) = &self.last_error {
            source.last_error = error.clone();
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_status() -> SourceStatus {
    SourceStatus::Pending
}

fn default_strategy() -> ScrapeStrategy {
    ScrapeStrategy::Weekly
}

fn default_source_type() -> SourceType {
    SourceType::Event
}

fn default_mode() -> ScrapingMode {
    ScrapingMode::Html
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_defaults() {
        let source = Source::new("Fundus Theater", "https://fundus-theater.de");
        assert!(source.is_active);
        assert_eq!(source.status, SourceStatus::Pending);
        assert_eq!(source.scraping_mode, ScrapingMode::Html);
        assert_eq!(source.source_type, SourceType::Event);
        assert_eq!(source.region, "hamburg");
    }

    #[test]
    fn test_source_deserialize_minimal() {
        let json = r#"{"name": "Kindaling", "input_url": "https://kindaling.de"}"#;
        let source: Source = serde_json::from_str(json).unwrap();
        assert_eq!(source.strategy, ScrapeStrategy::Weekly);
        assert!(source.last_scraped.is_none());
    }

    #[test]
    fn test_update_clears_error() {
        let mut source = Source::new("Fundus Theater", "https://fundus-theater.de");
        source.last_error = Some("boom".to_string());
        SourceUpdate::new()
            .status(SourceStatus::Active)
            .last_error(None)
            .apply(&mut source);
        assert_eq!(source.status, SourceStatus::Active);
        assert!(source.last_error.is_none());
    }

    #[test]
    fn test_update_leaves_unset_fields() {
        let mut source = Source::new("Fundus Theater", "https://fundus-theater.de");
        source.target_url = Some("https://fundus-theater.de/spielplan".to_string());
        SourceUpdate::new().status(SourceStatus::Error).apply(&mut source);
        assert_eq!(
            source.target_url.as_deref(),
            Some("https://fundus-theater.de/spielplan")
        );
    }
}
