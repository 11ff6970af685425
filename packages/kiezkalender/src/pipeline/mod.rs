//! Per-source scrape pipeline.
//!
//! One source runs through a fixed stage sequence: navigate, extract,
//! location-enrich, deduplicate, geocode. A stage error aborts that
//! source's run and is captured in the report; it never aborts the batch.

mod stages;

pub use stages::{DedupStage, EnrichStage, ExtractStage, GeocodeStage, NavigateStage};

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tracing::{info, warn};

use crate::config::ScraperConfig;
use crate::enrich::LocationEnricher;
use crate::error::Result;
use crate::extract::{MarkdownConverter, SemanticExtractor, VisionExtractor};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::geocode::Geocoder;
use crate::navigate::Navigator;
use crate::traits::{KeyValueCache, LanguageModel, Renderer};
use crate::types::{Event, ScrapeReport, Source};

/// Mutable state threaded through one source's stage sequence.
pub struct ScrapeContext<'a> {
    pub source: Source,
    pub force_discovery: bool,
    pub target_url: Option<String>,
    pub events: Vec<Event>,
    pub duplicates: Vec<Event>,
    pub events_found: usize,
    pub enriched: usize,
    pub geocoded: usize,
    pub tokens_used: u32,
    /// Fingerprints seen so far in this batch run, shared across sources
    /// so later sources deduplicate against earlier ones.
    pub seen: &'a mut HashSet<String>,
}

#[async_trait]
pub trait PipelineStage: Send + Sync {
    fn name(&self) -> &'static str;
    async fn run(&self, ctx: &mut ScrapeContext<'_>) -> Result<()>;
}

pub struct Pipeline {
    stages: Vec<Box<dyn PipelineStage>>,
}

impl Pipeline {
    pub fn new(
        config: &ScraperConfig,
        llm: Arc<dyn LanguageModel>,
        renderer: Arc<dyn Renderer>,
        venue_cache: Arc<dyn KeyValueCache>,
        geocode_cache: Arc<dyn KeyValueCache>,
    ) -> Result<Self> {
        let http = HttpFetcher::new(config.http_timeout)?;
        let fetcher = PageFetcher::new(
            http.clone(),
            renderer.clone(),
            config.js_required_domains.clone(),
        );
        let converter = MarkdownConverter::new(config, fetcher.clone(), http.clone());
        let semantic = SemanticExtractor::new(llm.clone(), fetcher.clone(), converter);
        let vision = VisionExtractor::new(llm.clone(), renderer, http);
        let navigator = Navigator::new(fetcher, Some(llm.clone()));
        let enricher = LocationEnricher::new(llm, venue_cache);
        let geocoder = Geocoder::new(config, geocode_cache)?;
        Ok(Self {
            stages: vec![
                Box::new(NavigateStage::new(navigator)),
                Box::new(ExtractStage::new(semantic, vision)),
                Box::new(EnrichStage::new(enricher)),
                Box::new(DedupStage),
                Box::new(GeocodeStage::new(geocoder)),
            ],
        })
    }

    /// Assemble a pipeline from arbitrary stages.
    pub fn with_stages(stages: Vec<Box<dyn PipelineStage>>) -> Self {
        Self { stages }
    }

    /// Run all stages for one source. Returns the report and the new
    /// events; a failed run returns no events.
    pub async fn run(
        &self,
        source: &Source,
        force_discovery: bool,
        seen: &mut HashSet<String>,
    ) -> (ScrapeReport, Vec<Event>) {
        info!(source = %source.name, mode = ?source.scraping_mode, "scraping source");
        let started = Instant::now();
        let mut report = ScrapeReport::for_source(source.id);
        let mut ctx = ScrapeContext {
            source: source.clone(),
            force_discovery,
            target_url: None,
            events: Vec::new(),
            duplicates: Vec::new(),
            events_found: 0,
            enriched: 0,
            geocoded: 0,
            tokens_used: 0,
            seen,
        };

        for stage in &self.stages {
            if let Err(err) = stage.run(&mut ctx).await {
                warn!(source = %source.name, stage = stage.name(), error = %err, "stage failed");
                report.success = false;
                report.error_message = Some(err.to_string());
                report.target_url = ctx.target_url.clone();
                report.duration_seconds = started.elapsed().as_secs_f64();
                return (report, Vec::new());
            }
        }

        report.events_found = ctx.events_found;
        report.events_new = ctx.events.len();
        report.events_duplicate = ctx.duplicates.len();
        report.events_enriched = ctx.enriched;
        report.events_geocoded = ctx.geocoded;
        report.tokens_used = ctx.tokens_used;
        report.target_url = ctx.target_url;
        report.duration_seconds = started.elapsed().as_secs_f64();
        info!(
            source = %source.name,
            found = report.events_found,
            new = report.events_new,
            duplicate = report.events_duplicate,
            tokens = report.tokens_used,
            "source done"
        );
        (report, ctx.events)
    }
}
