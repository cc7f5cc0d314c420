//! In-memory cache tier backed by a DashMap.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use super::tier::{CacheTier, TierError};

/// A cached entry with TTL support.
///
/// The data is wrapped in `Arc` so cache hits clone cheaply instead of
/// copying response bodies.
#[derive(Clone, Debug)]
pub struct CachedEntry {
    pub data: Arc<Vec<u8>>,
    pub cached_at: Instant,
    pub ttl: Duration,
}

impl CachedEntry {
    /// Create a new cached entry.
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data: Arc::new(data),
            cached_at: Instant::now(),
            ttl,
        }
    }

    /// Check if this entry has expired.
    pub fn is_expired(&self) -> bool {
        self.cached_at.elapsed() > self.ttl
    }
}

/// The process-local cache tier. Tracks hits and misses for `stats()`.
#[derive(Debug, Default)]
pub struct MemoryTier {
    entries: DashMap<String, CachedEntry>,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl MemoryTier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Look up a key, removing it lazily if expired. Counts a hit or miss.
    pub fn get_entry(&self, key: &str) -> Option<Arc<Vec<u8>>> {
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired() {
                self.hits.fetch_add(1, Ordering::Relaxed);
                return Some(Arc::clone(&entry.data));
            }
            drop(entry);
            self.entries.remove(key);
        }
        self.misses.fetch_add(1, Ordering::Relaxed);
        None
    }

    pub fn insert(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        self.entries
            .insert(key.to_string(), CachedEntry::new(value, ttl));
    }

    pub fn remove(&self, key: &str) {
        self.entries.remove(key);
    }

    /// Remove every key containing `substring`. An empty substring removes
    /// everything.
    pub fn remove_containing(&self, substring: &str) -> usize {
        let before = self.entries.len();
        self.entries.retain(|key, _| !key.contains(substring));
        before - self.entries.len()
    }

    pub fn key_count(&self) -> usize {
        self.entries.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    /// hits / (hits + misses), defined as 0 before any lookup.
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits() as f64;
        let total = hits + self.misses() as f64;
        if total == 0.0 { 0.0 } else { hits / total }
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TierError> {
        Ok(self.get_entry(key).map(|data| data.as_ref().clone()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), TierError> {
        self.insert(key, value.to_vec(), ttl);
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        self.remove(key);
        Ok(())
    }

    async fn delete_containing(&self, substring: &str) -> Result<(), TierError> {
        self.remove_containing(substring);
        Ok(())
    }

    async fn connected(&self) -> bool {
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_set_and_stats() {
        let tier = MemoryTier::new();
        assert_eq!(tier.hit_rate(), 0.0);

        tier.insert("farms_u1_{}", b"[]".to_vec(), Duration::from_secs(900));
        assert_eq!(tier.key_count(), 1);

        assert!(tier.get_entry("farms_u1_{}").is_some());
        assert!(tier.get_entry("missing").is_none());
        assert_eq!(tier.hits(), 1);
        assert_eq!(tier.misses(), 1);
        assert_eq!(tier.hit_rate(), 0.5);
    }

    #[test]
    fn expired_entries_are_removed_lazily() {
        let tier = MemoryTier::new();
        tier.insert("k", b"v".to_vec(), Duration::from_millis(0));
        std::thread::sleep(Duration::from_millis(10));
        assert!(tier.get_entry("k").is_none());
        assert_eq!(tier.key_count(), 0);
    }

    #[test]
    fn remove_containing_matches_substring_not_prefix() {
        let tier = MemoryTier::new();
        tier.insert("cattle_u1_{}", b"a".to_vec(), Duration::from_secs(60));
        tier.insert("farms_u1_cattle_x", b"b".to_vec(), Duration::from_secs(60));
        tier.insert("farms_u1_{}", b"c".to_vec(), Duration::from_secs(60));

        let removed = tier.remove_containing("cattle_");
        assert_eq!(removed, 2);
        assert_eq!(tier.key_count(), 1);
        assert!(tier.get_entry("farms_u1_{}").is_some());
    }

    #[test]
    fn empty_substring_clears_everything() {
        let tier = MemoryTier::new();
        tier.insert("a", b"1".to_vec(), Duration::from_secs(60));
        tier.insert("b", b"2".to_vec(), Duration::from_secs(60));
        tier.remove_containing("");
        assert_eq!(tier.key_count(), 0);
    }
}
