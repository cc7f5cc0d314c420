pub mod auth;
pub mod cache;
pub mod config;
pub mod handlers;
pub mod link_codes;
pub mod observability;
pub mod server;
pub mod state;

pub use cache::{
    CacheStats, CacheTier, DisconnectedTier, MemoryTier, RedisTier, ResponseCache,
    create_response_cache,
};
pub use config::{
    AppConfig, CacheConfig, LinkCodesConfig, PostgresStorageConfig, RedisConfig, ServerConfig,
    SupabaseConfig,
};
pub use link_codes::{
    ActiveCode, FarmLookup, IssuedCode, LinkCodeError, LinkCodeService, LinkedUser,
    MembershipLink, Redemption, spawn_sweeper,
};
pub use observability::{apply_logging_level, init_tracing};
pub use server::{CowtrackerServer, build_app};
pub use state::AppState;
