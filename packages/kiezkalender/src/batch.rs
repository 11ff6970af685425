//! Batch driver: runs the pipeline over every active event source and
//! persists the results.

use std::collections::HashSet;

use chrono::{Duration, Utc};
use chrono_tz::Europe::Berlin;
use tracing::{info, warn};

use crate::error::Result;
use crate::pipeline::Pipeline;
use crate::traits::EventStore;
use crate::types::{SourceStatus, SourceType, SourceUpdate};

#[derive(Debug, Default, Clone, Copy)]
pub struct BatchSummary {
    pub sources_total: usize,
    pub sources_succeeded: usize,
    pub sources_failed: usize,
    pub events_found: usize,
    pub events_new: usize,
    pub events_duplicate: usize,
    pub tokens_used: u32,
}

/// Scrape all active event sources in sequence. The seen-set is seeded
/// from stored fingerprints and shared across sources, so a batch never
/// stores the same logical event twice.
pub async fn run_batch(
    store: &dyn EventStore,
    pipeline: &Pipeline,
    force_discovery: bool,
) -> Result<BatchSummary> {
    let sources = store.get_sources(true, Some(SourceType::Event)).await?;
    let mut seen: HashSet<String> = store.get_event_hashes(None).await?.into_iter().collect();
    let mut summary = BatchSummary {
        sources_total: sources.len(),
        ..BatchSummary::default()
    };
    info!(sources = sources.len(), known_hashes = seen.len(), "starting batch run");

    for source in sources {
        let Some(source_id) = source.id else {
            warn!(source = %source.name, "source has no id, skipping");
            continue;
        };

        let (report, events) = pipeline.run(&source, force_discovery, &mut seen).await;

        let mut update = SourceUpdate::new()
            .status(if report.success {
                SourceStatus::Active
            } else {
                SourceStatus::Error
            })
            .last_scraped(Utc::now())
            .last_error(report.error_message.clone());
        if let Some(url) = &report.target_url {
            update = update.target_url(url.clone());
        }
        if let Err(err) = store.update_source(source_id, update).await {
            warn!(source = %source.name, error = %err, "source update failed");
        }

        for event in &events {
            if let Err(err) = store.upsert_event(event).await {
                warn!(event = %event.title, error = %err, "event upsert failed");
            }
        }

        summary.events_found += report.events_found;
        summary.events_new += report.events_new;
        summary.events_duplicate += report.events_duplicate;
        summary.tokens_used += report.tokens_used;
        if report.success {
            summary.sources_succeeded += 1;
        } else {
            summary.sources_failed += 1;
        }
    }

    info!(
        succeeded = summary.sources_succeeded,
        failed = summary.sources_failed,
        new_events = summary.events_new,
        duplicates = summary.events_duplicate,
        tokens = summary.tokens_used,
        "batch run done"
    );
    Ok(summary)
}

/// Drop events that started more than `days` days ago, Berlin time.
pub async fn cleanup_old_events(store: &dyn EventStore, days: i64) -> Result<usize> {
    let cutoff = (Utc::now().with_timezone(&Berlin) - Duration::days(days)).fixed_offset();
    let removed = store.delete_events_before(cutoff).await?;
    if removed > 0 {
        info!(removed, days, "removed stale events");
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;

    use crate::error::ScrapeError;
    use crate::pipeline::{PipelineStage, ScrapeContext};
    use crate::stores::MemoryStore;
    use crate::testing::{sample_event, sample_source};

    struct EmitStage;

    #[async_trait]
    impl PipelineStage for EmitStage {
        fn name(&self) -> &'static str {
            "emit"
        }

        async fn run(&self, ctx: &mut ScrapeContext<'_>) -> Result<()> {
            ctx.events = vec![sample_event(
                &format!("{} Fest", ctx.source.name),
                "2026-05-10T16:00:00",
                "Halle",
            )];
            ctx.events_found = 1;
            ctx.tokens_used = 10;
            Ok(())
        }
    }

    struct FailStage;

    #[async_trait]
    impl PipelineStage for FailStage {
        fn name(&self) -> &'static str {
            "fail"
        }

        async fn run(&self, _ctx: &mut ScrapeContext<'_>) -> Result<()> {
            Err(ScrapeError::Fetch("offline".to_string()))
        }
    }

    fn emit_pipeline() -> Pipeline {
        Pipeline::with_stages(vec![
            Box::new(EmitStage),
            Box::new(crate::pipeline::DedupStage),
        ])
    }

    #[tokio::test]
    async fn test_batch_stores_events_and_updates_sources() {
        let store = MemoryStore::new();
        let a = store.create_source(sample_source("Fundus Theater")).await.unwrap();
        store.create_source(sample_source("Zinnschmelze")).await.unwrap();

        let summary = run_batch(&store, &emit_pipeline(), false).await.unwrap();

        assert_eq!(summary.sources_total, 2);
        assert_eq!(summary.sources_succeeded, 2);
        assert_eq!(summary.events_new, 2);
        assert_eq!(summary.tokens_used, 20);
        assert_eq!(store.count_events().await.unwrap(), 2);

        let updated = store.get_source(a.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(updated.status, SourceStatus::Active);
        assert!(updated.last_scraped.is_some());
        assert!(updated.last_error.is_none());
    }

    #[tokio::test]
    async fn test_batch_seeds_seen_from_store() {
        let store = MemoryStore::new();
        store.create_source(sample_source("Fundus Theater")).await.unwrap();
        // the event EmitStage will produce is already stored
        let mut existing = sample_event("Fundus Theater Fest", "2026-05-10T16:00:00", "Halle");
        existing.id = Some(crate::dedup::fingerprint(&existing));
        store.upsert_event(&existing).await.unwrap();

        let summary = run_batch(&store, &emit_pipeline(), false).await.unwrap();

        assert_eq!(summary.events_new, 0);
        assert_eq!(summary.events_duplicate, 1);
        assert_eq!(store.count_events().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_batch_marks_failed_source() {
        let store = MemoryStore::new();
        let source = store.create_source(sample_source("Fundus Theater")).await.unwrap();

        let pipeline = Pipeline::with_stages(vec![Box::new(FailStage)]);
        let summary = run_batch(&store, &pipeline, false).await.unwrap();

        assert_eq!(summary.sources_failed, 1);
        assert_eq!(summary.events_new, 0);
        let updated = store.get_source(source.id.unwrap()).await.unwrap().unwrap();
        assert_eq!(updated.status, SourceStatus::Error);
        assert_eq!(updated.last_error.as_deref(), Some("fetch failed: offline"));
    }

    #[tokio::test]
    async fn test_cleanup_removes_past_events() {
        let store = MemoryStore::new();
        let mut old = sample_event("Altes Fest", "2020-01-01T10:00:00", "Halle");
        old.id = Some("old".to_string());
        let mut upcoming = sample_event("Neues Fest", "2030-01-01T10:00:00", "Halle");
        upcoming.id = Some("new".to_string());
        store.upsert_event(&old).await.unwrap();
        store.upsert_event(&upcoming).await.unwrap();

        let removed = cleanup_old_events(&store, 30).await.unwrap();

        assert_eq!(removed, 1);
        assert_eq!(store.count_events().await.unwrap(), 1);
        assert!(store.get_event("new").await.unwrap().is_some());
    }
}
