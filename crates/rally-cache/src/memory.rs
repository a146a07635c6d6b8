use crate::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// In-process TTL cache. Entries expire lazily on read; `purge_expired` can
/// be called from a periodic sweep to bound memory.
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, (String, Instant)>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drop every entry whose deadline has passed. Returns how many.
    pub async fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, (_, deadline)| *deadline > now);
        let removed = before - entries.len();
        if removed > 0 {
            debug!(removed, "Purged expired cache entries");
        }
        removed
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for MemoryCache {
    async fn lookup(&self, key: &str) -> Option<String> {
        let expired = {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some((value, deadline)) if *deadline > Instant::now() => {
                    return Some(value.clone())
                }
                Some(_) => true,
                None => false,
            }
        };
        if expired {
            self.entries.write().await.remove(key);
        }
        None
    }

    async fn store(&self, key: &str, value: String, ttl: Duration) {
        let deadline = Instant::now() + ttl;
        self.entries
            .write()
            .await
            .insert(key.to_string(), (value, deadline));
    }

    async fn invalidate(&self, key: &str) {
        self.entries.write().await.remove(key);
    }

    async fn invalidate_prefix(&self, prefix: &str) {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        let removed = before - entries.len();
        if removed > 0 {
            debug!(prefix, removed, "Invalidated cache entries by prefix");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{lookup_json, store_json};

    #[tokio::test]
    async fn test_store_and_lookup() {
        let cache = MemoryCache::new();
        cache
            .store("k1", "v1".to_string(), Duration::from_secs(60))
            .await;
        assert_eq!(cache.lookup("k1").await.as_deref(), Some("v1"));
        assert_eq!(cache.lookup("missing").await, None);
    }

    #[tokio::test]
    async fn test_ttl_expiry() {
        let cache = MemoryCache::new();
        cache
            .store("k1", "v1".to_string(), Duration::from_millis(10))
            .await;
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert_eq!(cache.lookup("k1").await, None);
        // Lazy expiry removed the row
        assert!(cache.is_empty().await);
    }

    #[tokio::test]
    async fn test_invalidate_prefix() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        cache.store("summary:u1", "a".to_string(), ttl).await;
        cache.store("summary:u1:c1", "b".to_string(), ttl).await;
        cache.store("rankings:all", "c".to_string(), ttl).await;

        cache.invalidate_prefix("summary:u1").await;

        assert_eq!(cache.lookup("summary:u1").await, None);
        assert_eq!(cache.lookup("summary:u1:c1").await, None);
        assert_eq!(cache.lookup("rankings:all").await.as_deref(), Some("c"));
    }

    #[tokio::test]
    async fn test_purge_expired() {
        let cache = MemoryCache::new();
        cache
            .store("old", "x".to_string(), Duration::from_millis(5))
            .await;
        cache
            .store("fresh", "y".to_string(), Duration::from_secs(60))
            .await;
        tokio::time::sleep(Duration::from_millis(20)).await;

        let removed = cache.purge_expired().await;
        assert_eq!(removed, 1);
        assert_eq!(cache.len().await, 1);
    }

    #[tokio::test]
    async fn test_json_roundtrip_and_bad_payload() {
        let cache = MemoryCache::new();
        let ttl = Duration::from_secs(60);
        store_json(&cache, "nums", &vec![1u32, 2, 3], ttl).await;
        let back: Option<Vec<u32>> = lookup_json(&cache, "nums").await;
        assert_eq!(back, Some(vec![1, 2, 3]));

        // A payload of the wrong shape reads as a miss and is evicted
        cache.store("nums", "not json".to_string(), ttl).await;
        let bad: Option<Vec<u32>> = lookup_json(&cache, "nums").await;
        assert_eq!(bad, None);
        assert_eq!(cache.lookup("nums").await, None);
    }
}
