//! The concrete stages behind [`Pipeline::new`](super::Pipeline::new).

use async_trait::async_trait;
use tracing::debug;

use crate::dedup;
use crate::enrich::LocationEnricher;
use crate::error::Result;
use crate::extract::{SemanticExtractor, VisionExtractor};
use crate::geocode::Geocoder;
use crate::navigate::Navigator;
use crate::pipeline::{PipelineStage, ScrapeContext};
use crate::types::ScrapingMode;

pub struct NavigateStage {
    navigator: Navigator,
}

impl NavigateStage {
    pub fn new(navigator: Navigator) -> Self {
        Self { navigator }
    }
}

#[async_trait]
impl PipelineStage for NavigateStage {
    fn name(&self) -> &'static str {
        "navigate"
    }

    async fn run(&self, ctx: &mut ScrapeContext<'_>) -> Result<()> {
        if ctx.source.scraping_mode == ScrapingMode::Vision {
            // vision sources screenshot whatever URL is configured
            ctx.target_url = Some(
                ctx.source
                    .target_url
                    .clone()
                    .unwrap_or_else(|| ctx.source.input_url.clone()),
            );
            return Ok(());
        }
        if !ctx.force_discovery {
            if let Some(url) = &ctx.source.target_url {
                debug!(url, "reusing cached calendar URL");
                ctx.target_url = Some(url.clone());
                return Ok(());
            }
        }
        ctx.target_url = Some(match self.navigator.discover(&ctx.source).await {
            Some(url) => url,
            None => {
                debug!(source = %ctx.source.name, "no calendar link found, scraping the input URL");
                ctx.source.input_url.clone()
            }
        });
        Ok(())
    }
}

pub struct ExtractStage {
    semantic: SemanticExtractor,
    vision: VisionExtractor,
}

impl ExtractStage {
    pub fn new(semantic: SemanticExtractor, vision: VisionExtractor) -> Self {
        Self { semantic, vision }
    }
}

#[async_trait]
impl PipelineStage for ExtractStage {
    fn name(&self) -> &'static str {
        "extract"
    }

    async fn run(&self, ctx: &mut ScrapeContext<'_>) -> Result<()> {
        let url = ctx
            .target_url
            .clone()
            .unwrap_or_else(|| ctx.source.input_url.clone());
        let extraction = match ctx.source.scraping_mode {
            ScrapingMode::Vision => self.vision.extract(&ctx.source, &url).await,
            ScrapingMode::Html => self.semantic.extract(&ctx.source, &url).await,
        };
        ctx.tokens_used += extraction.tokens_used;
        ctx.events = extraction.events;
        ctx.events_found = ctx.events.len();
        Ok(())
    }
}

pub struct EnrichStage {
    enricher: LocationEnricher,
}

impl EnrichStage {
    pub fn new(enricher: LocationEnricher) -> Self {
        Self { enricher }
    }
}

#[async_trait]
impl PipelineStage for EnrichStage {
    fn name(&self) -> &'static str {
        "enrich"
    }

    async fn run(&self, ctx: &mut ScrapeContext<'_>) -> Result<()> {
        let outcome = self.enricher.enrich(&mut ctx.events).await;
        ctx.enriched = outcome.enriched;
        ctx.tokens_used += outcome.tokens_used;
        Ok(())
    }
}

pub struct DedupStage;

#[async_trait]
impl PipelineStage for DedupStage {
    fn name(&self) -> &'static str {
        "dedup"
    }

    async fn run(&self, ctx: &mut ScrapeContext<'_>) -> Result<()> {
        let events = std::mem::take(&mut ctx.events);
        let outcome = dedup::split(events, ctx.seen, ctx.source.id);
        ctx.events = outcome.new_events;
        ctx.duplicates = outcome.duplicates;
        Ok(())
    }
}

pub struct GeocodeStage {
    geocoder: Geocoder,
}

impl GeocodeStage {
    pub fn new(geocoder: Geocoder) -> Self {
        Self { geocoder }
    }
}

#[async_trait]
impl PipelineStage for GeocodeStage {
    fn name(&self) -> &'static str {
        "geocode"
    }

    async fn run(&self, ctx: &mut ScrapeContext<'_>) -> Result<()> {
        ctx.geocoded = self.geocoder.enrich_events(&mut ctx.events).await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::fetch::{HttpFetcher, PageFetcher};
    use crate::testing::{sample_source, test_config, MockRenderer};
    use crate::traits::Renderer;
    use crate::types::Source;

    fn navigate_stage(renderer: MockRenderer) -> NavigateStage {
        let config = test_config();
        let http = HttpFetcher::new(config.http_timeout).unwrap();
        let renderer: Arc<dyn Renderer> = Arc::new(renderer);
        let fetcher = PageFetcher::new(http, renderer, vec!["theater.test".to_string()]);
        NavigateStage::new(Navigator::new(fetcher, None))
    }

    fn context(source: Source, force_discovery: bool, seen: &mut HashSet<String>) -> ScrapeContext<'_> {
        ScrapeContext {
            source,
            force_discovery,
            target_url: None,
            events: Vec::new(),
            duplicates: Vec::new(),
            events_found: 0,
            enriched: 0,
            geocoded: 0,
            tokens_used: 0,
            seen,
        }
    }

    #[tokio::test]
    async fn test_navigate_reuses_cached_target() {
        let mut source = sample_source("Fundus Theater");
        source.target_url = Some("https://theater.test/spielplan".to_string());
        let mut seen = HashSet::new();
        let mut ctx = context(source, false, &mut seen);

        navigate_stage(MockRenderer::new()).run(&mut ctx).await.unwrap();

        assert_eq!(ctx.target_url.as_deref(), Some("https://theater.test/spielplan"));
    }

    #[tokio::test]
    async fn test_navigate_force_rediscovers() {
        let mut source = sample_source("Fundus Theater");
        source.target_url = Some("https://theater.test/alt".to_string());
        let renderer = MockRenderer::new().with_page(
            "https://theater.test/",
            r#"<nav><a href="/spielplan">Spielplan</a></nav>"#,
        );
        let mut seen = HashSet::new();
        let mut ctx = context(source, true, &mut seen);

        navigate_stage(renderer).run(&mut ctx).await.unwrap();

        assert_eq!(ctx.target_url.as_deref(), Some("https://theater.test/spielplan"));
    }

    #[tokio::test]
    async fn test_navigate_falls_back_to_input_url() {
        let renderer = MockRenderer::new().with_page(
            "https://theater.test/",
            r#"<nav><a href="/impressum">Impressum</a></nav>"#,
        );
        let mut seen = HashSet::new();
        let mut ctx = context(sample_source("Fundus Theater"), false, &mut seen);

        navigate_stage(renderer).run(&mut ctx).await.unwrap();

        assert_eq!(ctx.target_url.as_deref(), Some("https://theater.test/"));
    }

    #[tokio::test]
    async fn test_vision_mode_skips_navigation() {
        let source = sample_source("Zirkus Abrax").with_mode(ScrapingMode::Vision);
        let mut seen = HashSet::new();
        let mut ctx = context(source, false, &mut seen);

        // no fixture: the stage must not fetch anything
        navigate_stage(MockRenderer::new()).run(&mut ctx).await.unwrap();

        assert_eq!(ctx.target_url.as_deref(), Some("https://theater.test/"));
    }
}
