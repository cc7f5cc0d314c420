use std::{env, sync::Arc, time::Duration};

use sqlx_core::pool::PoolOptions;
use sqlx_postgres::Postgres;

use cowtracker_core::SystemClock;
use cowtracker_server::auth::{AuthState, SupabaseAuthClient};
use cowtracker_server::config::loader::load_config;
use cowtracker_server::link_codes::{LinkCodeService, PgFarmLookup, PgMembershipLink, spawn_sweeper};
use cowtracker_server::{AppState, CowtrackerServer, create_response_cache};

/// How the configuration path was determined.
#[derive(Debug, Clone, Copy)]
enum ConfigSource {
    /// From --config CLI argument
    CliArgument,
    /// From COWTRACKER_CONFIG environment variable
    EnvironmentVariable,
    /// Default path (cowtracker.toml)
    Default,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::CliArgument => write!(f, "CLI argument (--config)"),
            Self::EnvironmentVariable => write!(f, "environment variable (COWTRACKER_CONFIG)"),
            Self::Default => write!(f, "default"),
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env file if present (before anything else)
    if let Err(e) = dotenvy::dotenv() {
        // Not an error if .env doesn't exist - it's optional
        if !matches!(e, dotenvy::Error::Io(ref io_err) if io_err.kind() == std::io::ErrorKind::NotFound)
        {
            eprintln!("Warning: Failed to load .env file: {e}");
        }
    }

    cowtracker_server::init_tracing();

    let (config_path, source) = resolve_config_path();

    let cfg = match load_config(Some(&config_path)) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Configuration error: {e}");
            std::process::exit(2);
        }
    };

    tracing::info!(
        path = %config_path,
        source = %source,
        "Configuration loaded"
    );

    cowtracker_server::apply_logging_level(&cfg.logging.level);

    // Connect to PostgreSQL
    let Some(pg) = cfg.storage.postgres.clone() else {
        eprintln!("Configuration error: storage.postgres config is required");
        std::process::exit(2);
    };
    let pool = match PoolOptions::<Postgres>::new()
        .max_connections(pg.pool_size)
        .acquire_timeout(pg.connect_timeout())
        .connect(&pg.connection_url())
        .await
    {
        Ok(pool) => Arc::new(pool),
        Err(e) => {
            eprintln!("Database connection failed: {e}");
            std::process::exit(2);
        }
    };
    tracing::info!(host = %pg.host, database = %pg.database, "Connected to PostgreSQL");

    // Response cache (memory-only unless Redis is enabled and reachable)
    let cache = Arc::new(create_response_cache(&cfg.redis, &cfg.cache).await);

    // Link-code service with its periodic expiry sweep
    let link_codes = Arc::new(LinkCodeService::new(
        Arc::new(PgFarmLookup::new(Arc::clone(&pool))),
        Arc::new(PgMembershipLink::new(Arc::clone(&pool))),
        Arc::new(SystemClock),
        Duration::from_secs(cfg.link_codes.default_duration_minutes * 60),
    ));
    spawn_sweeper(
        Arc::clone(&link_codes),
        Duration::from_secs(cfg.link_codes.sweep_interval_secs),
    );

    // Identity provider
    let provider = Arc::new(SupabaseAuthClient::new(
        cfg.supabase.url.clone(),
        cfg.supabase.anon_key.clone(),
    ));
    let auth = AuthState::new(provider, Arc::clone(&pool));

    let state = AppState {
        config: Arc::new(cfg),
        pool,
        cache,
        link_codes,
        auth,
    };

    if let Err(err) = CowtrackerServer::new(state).run().await {
        eprintln!("Server error: {err}");
    }
}

/// Resolve the configuration file path.
///
/// Priority order:
/// 1. CLI argument: --config <path>
/// 2. Environment variable: COWTRACKER_CONFIG
/// 3. Default: cowtracker.toml
fn resolve_config_path() -> (String, ConfigSource) {
    let mut args = env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            if let Some(path) = args.next() {
                return (path, ConfigSource::CliArgument);
            }
        }
    }

    if let Ok(path) = env::var("COWTRACKER_CONFIG") {
        if !path.is_empty() {
            return (path, ConfigSource::EnvironmentVariable);
        }
    }

    ("cowtracker.toml".to_string(), ConfigSource::Default)
}
