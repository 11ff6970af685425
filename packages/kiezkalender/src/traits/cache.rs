//! Key-value cache abstraction backing venue addresses and geocoding
//! results.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// An append-mostly JSON cache. `get`/`put` never fail; only `flush`
/// touches durable storage.
#[async_trait]
pub trait KeyValueCache: Send + Sync {
    async fn get(&self, key: &str) -> Option<Value>;

    async fn put(&self, key: &str, value: Value);

    /// Persist pending writes. A no-op for purely in-memory caches.
    async fn flush(&self) -> Result<()>;
}
