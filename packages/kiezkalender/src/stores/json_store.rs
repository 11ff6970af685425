//! JSON-file backed [`EventStore`].
//!
//! Good enough for a single scraper process writing a few hundred events per
//! run. Every mutation rewrites the whole file so readers never see a partial
//! update within one process.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;
use uuid::Uuid;

use crate::error::{Result, ScrapeError};
use crate::traits::EventStore;
use crate::types::{Event, Source, SourceType, SourceUpdate};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    sources: Vec<Source>,
    /// Keyed by event fingerprint.
    #[serde(default)]
    events: HashMap<String, Event>,
}

pub struct JsonFileStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl JsonFileStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = load_data(&path);
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    fn persist(&self, data: &StoreData) -> Result<()> {
        let json = serde_json::to_string_pretty(data)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ScrapeError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        fs::write(&self.path, json)
            .map_err(|e| ScrapeError::Storage(format!("write {}: {e}", self.path.display())))?;
        Ok(())
    }
}

fn load_data(path: &Path) -> StoreData {
    match fs::read_to_string(path) {
        Ok(json) => match serde_json::from_str(&json) {
            Ok(data) => data,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "store file is not valid JSON, starting empty");
                StoreData::default()
            }
        },
        Err(_) => StoreData::default(),
    }
}

#[async_trait]
impl EventStore for JsonFileStore {
    async fn create_source(&self, mut source: Source) -> Result<Source> {
        let id = source.id.unwrap_or_else(Uuid::new_v4);
        source.id = Some(id);
        let mut data = self.data.write().await;
        data.sources.retain(|s| s.id != Some(id));
        data.sources.push(source.clone());
        self.persist(&data)?;
        Ok(source)
    }

    async fn get_source(&self, id: Uuid) -> Result<Option<Source>> {
        let data = self.data.read().await;
        Ok(data.sources.iter().find(|s| s.id == Some(id)).cloned())
    }

    async fn get_sources(
        &self,
        active_only: bool,
        source_type: Option<SourceType>,
    ) -> Result<Vec<Source>> {
        let data = self.data.read().await;
        let mut result: Vec<Source> = data
            .sources
            .iter()
            .filter(|s| !active_only || s.is_active)
            .filter(|s| source_type.map_or(true, |t| s.source_type == t))
            .cloned()
            .collect();
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn update_source(&self, id: Uuid, update: SourceUpdate) -> Result<Option<Source>> {
        let mut data = self.data.write().await;
        let Some(source) = data.sources.iter_mut().find(|s| s.id == Some(id)) else {
            return Ok(None);
        };
        update.apply(source);
        let updated = source.clone();
        self.persist(&data)?;
        Ok(Some(updated))
    }

    async fn delete_source(&self, id: Uuid) -> Result<bool> {
        let mut data = self.data.write().await;
        let before = data.sources.len();
        data.sources.retain(|s| s.id != Some(id));
        let removed = data.sources.len() < before;
        if removed {
            self.persist(&data)?;
        }
        Ok(removed)
    }

    async fn upsert_event(&self, event: &Event) -> Result<()> {
        let id = event
            .id
            .clone()
            .ok_or_else(|| ScrapeError::Storage("event has no fingerprint id".to_string()))?;
        let mut data = self.data.write().await;
        data.events.insert(id, event.clone());
        self.persist(&data)?;
        Ok(())
    }

    async fn get_event(&self, id: &str) -> Result<Option<Event>> {
        let data = self.data.read().await;
        Ok(data.events.get(id).cloned())
    }

    async fn get_events(&self, region: Option<&str>) -> Result<Vec<Event>> {
        let data = self.data.read().await;
        let mut result: Vec<Event> = data
            .events
            .values()
            .filter(|e| region.map_or(true, |r| e.region == r))
            .cloned()
            .collect();
        result.sort_by_key(|e| e.date_start);
        Ok(result)
    }

    async fn get_event_hashes(&self, source_id: Option<Uuid>) -> Result<Vec<String>> {
        let data = self.data.read().await;
        Ok(data
            .events
            .values()
            .filter(|e| source_id.map_or(true, |id| e.source_id == Some(id)))
            .filter_map(|e| e.id.clone())
            .collect())
    }

    async fn delete_events_before(&self, cutoff: DateTime<FixedOffset>) -> Result<usize> {
        let mut data = self.data.write().await;
        let before = data.events.len();
        data.events.retain(|_, e| e.date_start >= cutoff);
        let removed = before - data.events.len();
        if removed > 0 {
            self.persist(&data)?;
        }
        Ok(removed)
    }

    async fn count_events(&self) -> Result<usize> {
        Ok(self.data.read().await.events.len())
    }
}
