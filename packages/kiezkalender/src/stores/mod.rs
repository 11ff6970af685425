//! Storage backends for sources, events and the on-disk caches.

mod json_cache;
mod json_store;
mod memory;

pub use json_cache::JsonFileCache;
pub use json_store::JsonFileStore;
pub use memory::{MemoryCache, MemoryStore};
