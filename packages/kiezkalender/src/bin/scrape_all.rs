// Nightly batch entry point: scrape every active source, then drop
// events that already happened.

use std::sync::Arc;

use anyhow::{Context, Result};
use kiezkalender::batch::{cleanup_old_events, run_batch};
use kiezkalender::fetch::ChromeRenderer;
use kiezkalender::llm::OpenAiModel;
use kiezkalender::stores::{JsonFileCache, JsonFileStore};
use kiezkalender::{Pipeline, ScraperConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,kiezkalender=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ScraperConfig::from_env().context("Failed to load configuration")?;
    let force_discovery = std::env::var("FORCE_DISCOVERY")
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let cleanup_days: i64 = std::env::var("CLEANUP_DAYS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(1);

    let store = JsonFileStore::open(&config.store_path);
    let venue_cache = Arc::new(JsonFileCache::open(&config.venue_cache_path));
    let geocode_cache = Arc::new(JsonFileCache::open(&config.geocode_cache_path));

    let llm = Arc::new(OpenAiModel::from_config(&config).context("Failed to build LLM client")?);
    let renderer = Arc::new(ChromeRenderer::from_config(&config));

    let pipeline = Pipeline::new(&config, llm, renderer, venue_cache, geocode_cache)
        .context("Failed to assemble pipeline")?;

    tracing::info!(force_discovery, "starting scrape of all active sources");
    let summary = run_batch(&store, &pipeline, force_discovery)
        .await
        .context("Batch run failed")?;
    tracing::info!(
        sources = summary.sources_total,
        succeeded = summary.sources_succeeded,
        failed = summary.sources_failed,
        found = summary.events_found,
        new = summary.events_new,
        duplicates = summary.events_duplicate,
        tokens = summary.tokens_used,
        "scrape finished"
    );

    let removed = cleanup_old_events(&store, cleanup_days)
        .await
        .context("Cleanup failed")?;
    tracing::info!(removed, "cleanup finished");

    Ok(())
}
