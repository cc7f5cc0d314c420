//! Redis-backed remote cache tier.

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::AsyncCommands;
use std::time::Duration;

use super::tier::{CacheTier, TierError};

/// The shared remote tier. All operations go through the deadpool
/// connection pool; errors are reported to the facade, which logs and
/// ignores them.
#[derive(Clone)]
pub struct RedisTier {
    pool: Pool,
}

impl RedisTier {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<deadpool_redis::Connection, TierError> {
        self.pool
            .get()
            .await
            .map_err(|e| TierError::Connection(e.to_string()))
    }
}

#[async_trait]
impl CacheTier for RedisTier {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, TierError> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| TierError::Command(e.to_string()))
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), TierError> {
        let mut conn = self.conn().await?;
        conn.set_ex::<_, _, ()>(key, value, ttl.as_secs())
            .await
            .map_err(|e| TierError::Command(e.to_string()))
    }

    async fn delete(&self, key: &str) -> Result<(), TierError> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| TierError::Command(e.to_string()))
    }

    async fn delete_containing(&self, substring: &str) -> Result<(), TierError> {
        let mut conn = self.conn().await?;
        let pattern = format!("*{substring}*");
        let keys: Vec<String> = conn
            .keys(&pattern)
            .await
            .map_err(|e| TierError::Command(e.to_string()))?;
        if !keys.is_empty() {
            conn.del::<_, ()>(keys)
                .await
                .map_err(|e| TierError::Command(e.to_string()))?;
        }
        Ok(())
    }

    async fn connected(&self) -> bool {
        self.pool.get().await.is_ok()
    }
}
