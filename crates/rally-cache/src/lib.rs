pub mod keys;
pub mod memory;

pub use memory::MemoryCache;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

/// Cache-aside port. Consulted before recomputation, invalidated after every
/// write that could affect a cached read; never a source of truth.
///
/// The trait is infallible: a broken cache degrades to a miss, it does not
/// fail the surrounding business operation. Adapters swallow their own
/// errors and log.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn lookup(&self, key: &str) -> Option<String>;
    async fn store(&self, key: &str, value: String, ttl: Duration);
    async fn invalidate(&self, key: &str);
    /// Drop every key starting with `prefix`.
    async fn invalidate_prefix(&self, prefix: &str);
}

/// Typed read through the cache. A payload that no longer deserializes is
/// treated as a miss and evicted.
pub async fn lookup_json<T: DeserializeOwned>(cache: &dyn CacheStore, key: &str) -> Option<T> {
    let raw = cache.lookup(key).await?;
    match serde_json::from_str(&raw) {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(key, error = %e, "Evicting undecodable cache entry");
            cache.invalidate(key).await;
            None
        }
    }
}

/// Typed write through the cache. Serialization failures are logged and
/// dropped; the caller already holds the fresh value.
pub async fn store_json<T: Serialize>(cache: &dyn CacheStore, key: &str, value: &T, ttl: Duration) {
    match serde_json::to_string(value) {
        Ok(raw) => cache.store(key, raw, ttl).await,
        Err(e) => warn!(key, error = %e, "Failed to serialize cache entry"),
    }
}
