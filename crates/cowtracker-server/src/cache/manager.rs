//! The cache facade composing the memory tier with a remote tier.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::config::{CacheConfig, RedisConfig};

use super::memory::MemoryTier;
use super::redis::RedisTier;
use super::tier::{CacheTier, DisconnectedTier};

/// Two-tier response cache: memory first, remote fallback.
///
/// The memory tier is authoritative for reads when present and unexpired;
/// the remote tier is the cross-process source of truth. Remote failures
/// never escape this facade.
pub struct ResponseCache {
    memory: MemoryTier,
    remote: Arc<dyn CacheTier>,
    backfill_ttl: Duration,
}

impl ResponseCache {
    /// Memory-only cache with the default backfill TTL.
    pub fn new_local() -> Self {
        Self::with_remote(Arc::new(DisconnectedTier), Duration::from_secs(300))
    }

    /// Cache composed with the given remote tier.
    pub fn with_remote(remote: Arc<dyn CacheTier>, backfill_ttl: Duration) -> Self {
        Self {
            memory: MemoryTier::new(),
            remote,
            backfill_ttl,
        }
    }

    /// Look up a key: memory tier first, then the remote tier. A remote hit
    /// is backfilled into the memory tier. Remote errors count as misses.
    pub async fn get(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(data) = self.memory.get_entry(key) {
            tracing::debug!(key = %key, "cache hit (memory)");
            return Some(data);
        }

        match self.remote.get(key).await {
            Ok(Some(data)) => {
                tracing::debug!(key = %key, "cache hit (remote)");
                self.memory.insert(key, data.clone(), self.backfill_ttl);
                Some(Arc::new(data))
            }
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "remote cache GET error");
                None
            }
        }
    }

    /// Store a value in both tiers. The remote write is best-effort.
    /// Returns whether the value was stored (memory writes cannot fail).
    pub async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> bool {
        self.memory.insert(key, value.clone(), ttl);

        if let Err(e) = self.remote.set(key, &value, ttl).await {
            tracing::warn!(key = %key, error = %e, "remote cache SET error");
        }
        true
    }

    /// Remove a key from both tiers, best-effort on the remote.
    pub async fn delete(&self, key: &str) {
        self.memory.remove(key);
        if let Err(e) = self.remote.delete(key).await {
            tracing::warn!(key = %key, error = %e, "remote cache DEL error");
        }
    }

    /// Remove every key containing `substring` from both tiers. An empty
    /// substring clears everything. Substring (not prefix) matching is the
    /// contract; narrowing it would leave stale entries behind.
    pub async fn invalidate_pattern(&self, substring: &str) {
        let removed = self.memory.remove_containing(substring);
        tracing::debug!(pattern = %substring, removed, "cache invalidated (memory)");

        if let Err(e) = self.remote.delete_containing(substring).await {
            tracing::warn!(pattern = %substring, error = %e, "remote cache pattern invalidation error");
        }
    }

    /// Snapshot of cache statistics.
    pub async fn stats(&self) -> CacheStats {
        CacheStats {
            memory: MemoryStats {
                keys: self.memory.key_count(),
                hits: self.memory.hits(),
                misses: self.memory.misses(),
                hit_rate: self.memory.hit_rate(),
            },
            redis: RemoteStats {
                connected: self.remote.connected().await,
            },
        }
    }
}

/// Cache statistics snapshot.
#[derive(Debug, Clone, Serialize)]
pub struct CacheStats {
    pub memory: MemoryStats,
    pub redis: RemoteStats,
}

#[derive(Debug, Clone, Serialize)]
pub struct MemoryStats {
    pub keys: usize,
    pub hits: u64,
    pub misses: u64,
    #[serde(rename = "hitRate")]
    pub hit_rate: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct RemoteStats {
    pub connected: bool,
}

/// Create a response cache based on configuration.
///
/// - Redis disabled: memory-only cache
/// - Redis enabled: attempts to connect, falls back to memory-only on failure
pub async fn create_response_cache(redis: &RedisConfig, cache: &CacheConfig) -> ResponseCache {
    let backfill_ttl = Duration::from_secs(cache.backfill_ttl_secs);

    if !redis.enabled {
        tracing::info!("Redis disabled, using in-memory cache only");
        return ResponseCache::new_local();
    }

    tracing::info!(url = %redis.url, "Connecting to Redis");

    let mut redis_config = deadpool_redis::Config::from_url(&redis.url);
    if let Some(ref mut pool_config) = redis_config.pool {
        pool_config.max_size = redis.pool_size;
        pool_config.timeouts.wait = Some(Duration::from_millis(redis.timeout_ms));
        pool_config.timeouts.create = Some(Duration::from_millis(redis.timeout_ms));
        pool_config.timeouts.recycle = Some(Duration::from_millis(redis.timeout_ms));
    }

    let pool = match redis_config.create_pool(Some(deadpool_redis::Runtime::Tokio1)) {
        Ok(pool) => pool,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to create Redis pool. Falling back to in-memory cache.");
            return ResponseCache::new_local();
        }
    };

    match pool.get().await {
        Ok(_) => {
            tracing::info!("Connected to Redis");
            ResponseCache::with_remote(Arc::new(RedisTier::new(pool)), backfill_ttl)
        }
        Err(e) => {
            tracing::warn!(error = %e, "Failed to connect to Redis. Falling back to in-memory cache.");
            ResponseCache::new_local()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::tier::TierError;
    use async_trait::async_trait;

    /// Remote tier stub that fails every operation.
    struct FailingTier;

    #[async_trait]
    impl CacheTier for FailingTier {
        async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, TierError> {
            Err(TierError::Connection("refused".into()))
        }
        async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), TierError> {
            Err(TierError::Connection("refused".into()))
        }
        async fn delete(&self, _key: &str) -> Result<(), TierError> {
            Err(TierError::Connection("refused".into()))
        }
        async fn delete_containing(&self, _substring: &str) -> Result<(), TierError> {
            Err(TierError::Connection("refused".into()))
        }
        async fn connected(&self) -> bool {
            false
        }
    }

    #[tokio::test]
    async fn set_then_get_returns_value() {
        let cache = ResponseCache::new_local();
        cache
            .set("farms_u1_{}", b"[1,2]".to_vec(), Duration::from_secs(900))
            .await;

        let value = cache.get("farms_u1_{}").await;
        assert_eq!(value.as_deref().map(Vec::as_slice), Some(&b"[1,2]"[..]));

        let stats = cache.stats().await;
        assert!(stats.memory.keys >= 1);
        assert!(!stats.redis.connected);
    }

    #[tokio::test]
    async fn remote_hit_backfills_memory() {
        // Use a MemoryTier as the "remote" to simulate a reachable shared
        // cache that retained a value across a process restart.
        let remote = Arc::new(MemoryTier::new());
        remote.insert("k", b"shared".to_vec(), Duration::from_secs(60));

        let cache = ResponseCache::with_remote(remote.clone(), Duration::from_secs(300));

        // Memory tier of the facade is empty; value comes from remote.
        let value = cache.get("k").await;
        assert_eq!(value.as_deref().map(Vec::as_slice), Some(&b"shared"[..]));

        // Second get hits the backfilled memory tier even if the remote
        // loses the key.
        remote.remove("k");
        let value = cache.get("k").await;
        assert_eq!(value.as_deref().map(Vec::as_slice), Some(&b"shared"[..]));
    }

    #[tokio::test]
    async fn remote_failures_are_swallowed() {
        let cache = ResponseCache::with_remote(Arc::new(FailingTier), Duration::from_secs(300));

        // set succeeds even though the remote write fails
        assert!(cache.set("k", b"v".to_vec(), Duration::from_secs(60)).await);
        // get served from memory
        assert!(cache.get("k").await.is_some());
        // a remote-only lookup degrades to a miss
        assert!(cache.get("other").await.is_none());
        // delete and pattern invalidation do not panic or error
        cache.delete("k").await;
        cache.invalidate_pattern("anything").await;
    }

    #[tokio::test]
    async fn pattern_invalidation_hits_both_tiers() {
        let remote = Arc::new(MemoryTier::new());
        let cache = ResponseCache::with_remote(remote.clone(), Duration::from_secs(300));

        cache
            .set("cattle_u1_{}", b"a".to_vec(), Duration::from_secs(60))
            .await;
        cache
            .set("farms_u1_{}", b"b".to_vec(), Duration::from_secs(60))
            .await;

        cache.invalidate_pattern("cattle_").await;

        assert!(cache.get("cattle_u1_{}").await.is_none());
        assert!(cache.get("farms_u1_{}").await.is_some());
        // remote tier cleared as well
        assert!(remote.get_entry("cattle_u1_{}").is_none());
    }

    #[tokio::test]
    async fn spec_scenario_farms_key() {
        let cache = ResponseCache::new_local();
        cache
            .set("farms_u1_{}", b"[...]".to_vec(), Duration::from_secs(900))
            .await;

        let stats = cache.stats().await;
        assert!(stats.memory.keys >= 1);

        cache.invalidate_pattern("farms_").await;
        assert!(cache.get("farms_u1_{}").await.is_none());
    }

    #[tokio::test]
    async fn hit_rate_is_zero_without_lookups() {
        let cache = ResponseCache::new_local();
        let stats = cache.stats().await;
        assert_eq!(stats.memory.hits, 0);
        assert_eq!(stats.memory.misses, 0);
        assert_eq!(stats.memory.hit_rate, 0.0);
    }
}
