//! The cache tier interface and the disconnected placeholder tier.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Errors a cache tier can report. The facade never lets these escape to a
/// request handler.
#[derive(Debug, Error)]
pub enum TierError {
    #[error("connection error: {0}")]
    Connection(String),
    #[error("command error: {0}")]
    Command(String),
}

/// A single cache tier.
///
/// Implemented by the in-memory tier, the Redis tier, and the disconnected
/// placeholder used when Redis is unavailable.
#[async_trait]
pub trait CacheTier: Send + Sync {
    /// Look up a key. `Ok(None)` is a miss.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TierError>;

    /// Store a value with a TTL.
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), TierError>;

    /// Remove a single key.
    async fn delete(&self, key: &str) -> Result<(), TierError>;

    /// Remove every key containing `substring`. An empty substring matches
    /// all keys.
    async fn delete_containing(&self, substring: &str) -> Result<(), TierError>;

    /// Whether the tier currently has a usable backend connection.
    async fn connected(&self) -> bool;
}

/// Placeholder tier used when no remote cache is configured or reachable.
/// Every lookup misses and every write is accepted and dropped.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisconnectedTier;

#[async_trait]
impl CacheTier for DisconnectedTier {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, TierError> {
        Ok(None)
    }

    async fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), TierError> {
        Ok(())
    }

    async fn delete(&self, _key: &str) -> Result<(), TierError> {
        Ok(())
    }

    async fn delete_containing(&self, _substring: &str) -> Result<(), TierError> {
        Ok(())
    }

    async fn connected(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn disconnected_tier_always_misses() {
        let tier = DisconnectedTier;
        tier.set("k", b"v", Duration::from_secs(60)).await.unwrap();
        assert_eq!(tier.get("k").await.unwrap(), None);
        assert!(!tier.connected().await);
    }
}
