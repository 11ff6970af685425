//! JSON-file backed key/value cache for venue addresses and geocode results.
//!
//! The whole file is read into memory when the cache is opened. Writes only
//! touch the in-memory map; `flush` persists the map back to disk when it
//! changed. One process per cache file, there is no cross-process locking.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{Result, ScrapeError};
use crate::traits::KeyValueCache;

pub struct JsonFileCache {
    path: PathBuf,
    entries: RwLock<HashMap<String, Value>>,
    dirty: AtomicBool,
}

impl JsonFileCache {
    /// Opens the cache at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let entries = load_entries(&path);
        Self {
            path,
            entries: RwLock::new(entries),
            dirty: AtomicBool::new(false),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

fn load_entries(path: &Path) -> HashMap<String, Value> {
    match fs::read_to_string(path) {
        Ok(data) => match serde_json::from_str(&data) {
            Ok(entries) => entries,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "cache file is not valid JSON, starting empty");
                HashMap::new()
            }
        },
        Err(_) => HashMap::new(),
    }
}

#[async_trait]
impl KeyValueCache for JsonFileCache {
    async fn get(&self, key: &str) -> Option<Value> {
        self.entries.read().await.get(key).cloned()
    }

    async fn put(&self, key: &str, value: Value) {
        let mut entries = self.entries.write().await;
        if entries.get(key) != Some(&value) {
            entries.insert(key.to_string(), value);
            self.dirty.store(true, Ordering::Relaxed);
        }
    }

    async fn flush(&self) -> Result<()> {
        if !self.dirty.swap(false, Ordering::Relaxed) {
            return Ok(());
        }
        let entries = self.entries.read().await;
        let data = serde_json::to_string_pretty(&*entries)?;
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .map_err(|e| ScrapeError::Storage(format!("create {}: {e}", parent.display())))?;
        }
        fs::write(&self.path, data)
            .map_err(|e| ScrapeError::Storage(format!("write {}: {e}", self.path.display())))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let cache = JsonFileCache::open(dir.path().join("venues.json"));
        assert_eq!(cache.len().await, 0);
        assert!(cache.get("fundus theater").await.is_none());
    }

    #[tokio::test]
    async fn test_put_flush_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("venues.json");

        let cache = JsonFileCache::open(&path);
        cache
            .put(
                "fundus theater",
                json!({"address": "Hasselbrookstraße 25, 22089 Hamburg", "district": "Eilbek"}),
            )
            .await;
        cache.flush().await.unwrap();

        let reopened = JsonFileCache::open(&path);
        let value = reopened.get("fundus theater").await.unwrap();
        assert_eq!(value["district"], "Eilbek");
    }

    #[tokio::test]
    async fn test_flush_skips_when_clean() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");

        let cache = JsonFileCache::open(&path);
        cache.flush().await.unwrap();
        assert!(!path.exists());

        cache.put("k", json!({"miss": true})).await;
        cache.flush().await.unwrap();
        assert!(path.exists());

        // Unchanged value does not mark the cache dirty again.
        let modified = fs::metadata(&path).unwrap().modified().unwrap();
        cache.put("k", json!({"miss": true})).await;
        cache.flush().await.unwrap();
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), modified);
    }

    #[tokio::test]
    async fn test_corrupt_file_starts_empty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        let cache = JsonFileCache::open(&path);
        assert_eq!(cache.len().await, 0);
    }
}
