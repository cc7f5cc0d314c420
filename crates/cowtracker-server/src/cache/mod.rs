//! Two-tier response caching.
//!
//! ## Architecture
//!
//! - **Memory tier (DashMap)**: in-process, microsecond latency
//! - **Remote tier (Redis)**: network, shared with other processes
//!
//! Reads check the memory tier first and fall back to Redis; a Redis hit is
//! backfilled into the memory tier. Writes go to both tiers. The remote tier
//! is strictly best-effort: any Redis failure is logged and treated as a
//! miss, never surfaced to a caller.
//!
//! ## Graceful Degradation
//!
//! If Redis is disabled or unreachable, the facade composes a no-op remote
//! tier and runs memory-only.

pub mod http;
pub mod manager;
pub mod memory;
pub mod redis;
pub mod tier;

pub use http::{InvalidateOnWrite, ReadThrough, fingerprint, invalidate_on_write, read_through};
pub use manager::{CacheStats, MemoryStats, RemoteStats, ResponseCache, create_response_cache};
pub use memory::{CachedEntry, MemoryTier};
pub use redis::RedisTier;
pub use tier::{CacheTier, DisconnectedTier, TierError};
