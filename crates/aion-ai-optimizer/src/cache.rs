use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use tracing::debug;

#[derive(Debug, Clone)]
struct CacheEntry {
    value: String,
    created_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
    access_count: u64,
    last_access: DateTime<Utc>,
}

/// LRU-with-TTL cache. `get` mutates access bookkeeping, so it takes the
/// same exclusive lock as `set` — there is no shared-to-exclusive lock
/// upgrade here, which sidesteps the deadlock that pattern invites.
pub struct ResponseCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    max_size: usize,
    default_ttl: Duration,
}

impl ResponseCache {
    pub fn new(max_size: usize, default_ttl: Duration) -> Self {
        Self { entries: RwLock::new(HashMap::new()), max_size, default_ttl }
    }

    pub async fn get(&self, key: &str) -> Option<String> {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let hit = entries.get_mut(key)?;
        if hit.expires_at < now {
            entries.remove(key);
            return None;
        }
        hit.access_count += 1;
        hit.last_access = now;
        Some(hit.value.clone())
    }

    pub async fn set(&self, key: String, value: String) {
        self.set_with_ttl(key, value, self.default_ttl).await;
    }

    pub async fn set_with_ttl(&self, key: String, value: String, ttl: Duration) {
        let mut entries = self.entries.write().await;
        if entries.len() >= self.max_size && !entries.contains_key(&key) {
            if let Some(lru_key) = entries.iter().min_by_key(|(_, e)| e.last_access).map(|(k, _)| k.clone()) {
                entries.remove(&lru_key);
            }
        }
        let now = Utc::now();
        entries.insert(
            key,
            CacheEntry {
                value,
                created_at: now,
                expires_at: now + chrono::Duration::from_std(ttl).unwrap_or_default(),
                access_count: 0,
                last_access: now,
            },
        );
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Drops every expired entry. Intended to be called periodically by a
    /// background sweep (every 5 minutes per the optimiser's contract).
    pub async fn sweep_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let now = Utc::now();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at >= now);
        before - entries.len()
    }
}

/// Runs `sweep_expired` on a fixed interval for the lifetime of the handle,
/// mirroring `aion_workflow::spawn_monitor_loop`'s periodic-background-task shape.
pub fn spawn_sweep_loop(cache: Arc<ResponseCache>, interval: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        loop {
            ticker.tick().await;
            let dropped = cache.sweep_expired().await;
            if dropped > 0 {
                debug!(dropped, "swept expired cache entries");
            }
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn set_then_get_round_trips() {
        let cache = ResponseCache::new(10, Duration::from_secs(60));
        cache.set("k".into(), "v".into()).await;
        assert_eq!(cache.get("k").await, Some("v".to_string()));
    }

    #[tokio::test]
    async fn eviction_drops_least_recently_accessed_key() {
        let cache = ResponseCache::new(2, Duration::from_secs(60));
        cache.set("a".into(), "1".into()).await;
        cache.set("b".into(), "2".into()).await;
        // Touch "a" so "b" becomes the least-recently-accessed entry.
        assert_eq!(cache.get("a").await, Some("1".to_string()));
        cache.set("c".into(), "3".into()).await;

        assert_eq!(cache.get("a").await, Some("1".to_string()));
        assert_eq!(cache.get("b").await, None);
        assert_eq!(cache.get("c").await, Some("3".to_string()));
    }

    #[tokio::test]
    async fn expired_entries_are_not_returned() {
        let cache = ResponseCache::new(10, Duration::from_millis(1));
        cache.set("k".into(), "v".into()).await;
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn spawned_sweep_loop_drops_expired_entries_in_the_background() {
        let cache = Arc::new(ResponseCache::new(10, Duration::from_millis(1)));
        cache.set("k".into(), "v".into()).await;
        spawn_sweep_loop(cache.clone(), Duration::from_millis(5));

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(cache.len().await, 0);
    }
}
