//! In-memory store and cache, used in tests and one-off runs.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde_json::Value;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::{Result, ScrapeError};
use crate::traits::{EventStore, KeyValueCache};
use crate::types::{Event, Source, SourceType, SourceUpdate};

/// Non-persistent [`EventStore`] backed by hash maps.
#[derive(Default)]
pub struct MemoryStore {
    sources: RwLock<HashMap<Uuid, Source>>,
    events: RwLock<HashMap<String, Event>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EventStore for MemoryStore {
    async fn create_source(&self, mut source: Source) -> Result<Source> {
        let id = source.id.unwrap_or_else(Uuid::new_v4);
        source.id = Some(id);
        self.sources.write().await.insert(id, source.clone());
        Ok(source)
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        Ok(self.sources.read().await.get(&id).cloned())
    }

    async fn get_sources(
        &self,
        active_only: bool,
        source_type: Option<SourceType>,
    ) -> Result<Vec<Source>> {
        let sources = self.sources.read().await;
        let mut result: Vec<Source> = sources
            .values()
            .filter(|s| !active_only || s.is_active)
            .filter(|s| source_type.map_or(true, |t| s.source_type == t))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn update_source(&self, id: Uuid, update: SourceUpdate) -> Result<Option<Source>> {
        let mut sources = self.sources.write().await;
        match sources.get_mut(&id) {
            Some(source) => {
                update.apply(source);
                Ok(Some(source.clone()))
            }
            None => Ok(None),
        }
    }

    async fn delete_source(&self, id: Uuid) -> Result<bool> {
        Ok(self.sources.write().await.remove(&id).is_some())
    }

    async fn upsert_event(&self, event: &Event) -> Result<()> {
        let id = event
            .id
            .clone()
            .ok_or_else(|| ScrapeError::Storage("event has no fingerprint id".to_string()))?;
        self.events.write().await.insert(id, event.clone());
        Ok(())
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        Ok(self.events.read().await.get(id).cloned())
    }

    async fn get_events(&self, region: Option<&str>) -> Result<Vec<Event>> {
        let events = self.events.read().await;
        let mut result: Vec<Event> = events
            .values()
            .filter(|e| region.map_or(true, |r| e.region == r))
            .cloned()
            .collect();
        result.sort_by_key(|e| e.date_start);
        Ok(result)
    }

    async fn get_event_hashes(&self, source_id: Option<Uuid>) -> Result<Vec<String>> {
        let events = self.events.read().await;
        Ok(events
            .values()
            .filter(|e| source_id.map_or(true, |id| e.source_id == Some(id)))
            .filter_map(|e| e.id.clone())
            .collect())
    }

    async fn delete_events_before(&self, cutoff: DateTime<FixedOffset>) -> Result<usize> {
        let mut events = self.events.write().await;
        let before = events.len();
        events.retain(|_, e| e.date_start >= cutoff);
        Ok(before - events.len())
    }

    async fn count_events(&self) -> Result<usize> {
        Ok(self.events.read().await.len())
    }
}

/// Non-persistent [`KeyValueCache`].
#[derive(Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Value>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl KeyValueCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn put(&self, key: &str, value: Value) {
        self.entries.write().await.insert(key.to_string(), value);
    }

    async fn flush(&self) -> Result<()> {
        Ok(())
    }
}
