//! Per-source scrape outcome.

use serde::Serialize;
use uuid::Uuid;

/// What happened while scraping one source.
#[derive(Debug, Clone, Serialize)]
pub struct ScrapeReport {
    pub source_id: Option<Uuid>,
    pub success: bool,
    /// Events the extractor produced, before deduplication.
    pub events_found: usize,
    pub events_new: usize,
    pub events_duplicate: usize,
    pub events_enriched: usize,
    pub events_geocoded: usize,
    pub error_message: Option<String>,
    pub tokens_used: u32,
    pub duration_seconds: f64,
    /// Calendar URL the run ended up scraping.
    pub target_url: Option<String>,
}

impl ScrapeReport {
    pub fn for_source(source_id: Option<Uuid>) -> Self {
        Self {
            source_id,
            success: true,
            events_found: 0,
            events_new: 0,
            events_duplicate: 0,
            events_enriched: 0,
            events_geocoded: 0,
            error_message: None,
            tokens_used: 0,
            duration_seconds: 0.0,
            target_url: None,
        }
    }
}
