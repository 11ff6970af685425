//! Persistence abstraction for sources and events.
//!
//! The pipeline only needs keyed upserts and a few filtered reads, so any
//! key-value capable backend can implement this.

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use uuid::Uuid;

use crate::error::Result;
use crate::types::{Event, Source, SourceType, SourceUpdate};

#[async_trait]
pub trait EventStore: Send + Sync {
    /// Insert a new source, assigning an id when it has none.
    async fn create_source(&self, source: Source) -> Result<Source>;

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>>;

    /// List sources, optionally restricted to active ones of one type.
    async fn get_sources(
        &self,
        active_only: bool,
        source_type: Option<SourceType>,
    ) -> Result<Vec<Source>>;

    /// Apply a partial update. Returns the updated source, or `None` when
    /// the id is unknown.
    async fn update_source(&self, id: Uuid, update: SourceUpdate) -> Result<Option<Source>>;

    async fn delete_source(&self, id: Uuid) -> Result<bool>;

    /// Insert or replace an event keyed by its fingerprint id.
    async fn upsert_event(&self, event: &Event) -> Result<()>;

    async fn get_event(&self, id: &str) -> Result<Option<Event>>;

    async fn get_events(&self, region: Option<&str>) -> Result<Vec<Event>>;

    /// All stored fingerprints, optionally restricted to one source.
    async fn get_event_hashes(&self, source_id: Option<Uuid>) -> Result<Vec<String>>;

    /// Remove events that started before `cutoff`. Returns the removed count.
    async fn delete_events_before(&self, cutoff: DateTime<FixedOffset>) -> Result<usize>;

    async fn count_events(&self) -> Result<usize>;
}
