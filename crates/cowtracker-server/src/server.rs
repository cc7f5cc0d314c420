//! Router assembly and the HTTP server.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router, middleware,
    routing::{delete, get, post, put},
};
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::cache::http::{InvalidateOnWrite, ReadThrough, invalidate_on_write, read_through};
use crate::handlers::{
    cattle, farms, link_codes, medications, memberships, sales, system, users, vet_records,
};
use crate::state::AppState;

// Substring patterns cleared by each mutating route group. A resource's
// mutations clear every family whose cached presentation they can change.
const USER_PATTERNS: &[&str] = &["user_"];
const FARM_PATTERNS: &[&str] = &["farms_", "cattle_", "user_"];
const CATTLE_PATTERNS: &[&str] = &["cattle_", "farms_"];
const CATTLE_MEDICAL_PATTERNS: &[&str] = &["cattle_", "veterinaria_"];
const VET_PATTERNS: &[&str] = &["veterinaria_", "cattle_"];
const MEDICATION_PATTERNS: &[&str] = &["medicamentos_", "veterinaria_"];
const SALE_PATTERNS: &[&str] = &["ventas_", "cattle_"];
const MEMBERSHIP_PATTERNS: &[&str] = &["user_", "farms_"];

pub fn build_app(state: AppState) -> Router {
    let body_limit = state.config.server.body_limit_bytes;

    Router::new()
        // Health and info endpoints
        .route("/", get(system::root))
        .route("/api/test", get(system::api_test))
        // Cache administration
        .route("/api/cache/stats", get(system::cache_stats))
        .route("/api/cache/clear", post(system::cache_clear))
        // Resources
        .nest("/api/users", users_router(&state))
        .nest("/api/farms", farms_router(&state))
        .nest("/api/cattle", cattle_router(&state))
        .nest("/api/medicamentos", medications_router(&state))
        .nest("/api/veterinary", vet_records_router(&state))
        .nest("/api/ventas", sales_router(&state))
        .nest("/api/usuario-finca", memberships_router(&state))
        .nest("/api/vincular", link_codes_router(&state))
        // Middleware stack
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri()
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     _span: &tracing::Span| {
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(axum::extract::DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Read-through caching for a route group's GET endpoints. Non-GET requests
/// pass through untouched.
fn cached(
    state: &AppState,
    scope: &'static str,
    ttl_secs: u64,
    routes: Router<AppState>,
) -> Router<AppState> {
    routes.layer(middleware::from_fn_with_state(
        ReadThrough::new(
            Arc::clone(&state.cache),
            state.auth.clone(),
            scope,
            Duration::from_secs(ttl_secs),
        ),
        read_through,
    ))
}

/// Pattern invalidation for a route group's mutating endpoints. GET requests
/// pass through untouched.
fn invalidating(
    state: &AppState,
    patterns: &'static [&'static str],
    routes: Router<AppState>,
) -> Router<AppState> {
    routes.layer(middleware::from_fn_with_state(
        InvalidateOnWrite::new(Arc::clone(&state.cache), patterns),
        invalidate_on_write,
    ))
}

fn users_router(state: &AppState) -> Router<AppState> {
    let cfg = &state.config.cache;

    // Cached reads and invalidating mutations share one router; each layer
    // only acts on the methods it cares about. Login/register/refresh are
    // unauthenticated and never cached (non-GET).
    let routes = Router::new()
        .route("/register", post(users::register))
        .route("/login", post(users::login))
        .route("/refresh-token", post(users::refresh_token))
        .route(
            "/profile",
            get(users::get_profile).put(users::update_profile),
        )
        .route("/premium-types", get(users::premium_types))
        .route("/premium", put(users::update_premium))
        .route("/", get(users::list))
        .route("/{id}/role", put(users::change_role));

    invalidating(
        state,
        USER_PATTERNS,
        cached(state, "user", cfg.users_ttl_secs, routes),
    )
}

fn farms_router(state: &AppState) -> Router<AppState> {
    let cfg = &state.config.cache;

    let routes = Router::new()
        .route("/", get(farms::list).post(farms::create))
        .route(
            "/{id}",
            get(farms::get).put(farms::update).delete(farms::delete),
        )
        .route("/{id}/cattle", get(farms::cattle))
        .route(
            "/{id}/workers",
            get(farms::workers).post(farms::member_management_unsupported),
        )
        .route(
            "/{id}/workers/{worker_id}",
            delete(farms::member_management_unsupported),
        )
        .route(
            "/{id}/veterinarians",
            get(farms::veterinarians).post(farms::member_management_unsupported),
        )
        .route(
            "/{id}/veterinarians/{vet_id}",
            delete(farms::member_management_unsupported),
        );

    // Farm changes can surface in farm, cattle, and user presentations.
    invalidating(
        state,
        FARM_PATTERNS,
        cached(state, "farms", cfg.farms_ttl_secs, routes),
    )
}

fn cattle_router(state: &AppState) -> Router<AppState> {
    let cfg = &state.config.cache;

    let routes = Router::new()
        .route("/", get(cattle::list).post(cattle::create))
        .route("/with-farm-info", get(cattle::list_with_farm_info))
        .route(
            "/{id}",
            get(cattle::get).put(cattle::update).delete(cattle::delete),
        )
        .route("/{id}/medical-records", get(cattle::medical_records));

    let main = invalidating(
        state,
        CATTLE_PATTERNS,
        cached(state, "cattle", cfg.cattle_ttl_secs, routes),
    );

    // Attaching a medical record also touches the veterinary family.
    let medical = invalidating(
        state,
        CATTLE_MEDICAL_PATTERNS,
        Router::new().route("/{id}/medical", post(cattle::add_medical_record)),
    );

    main.merge(medical)
}

fn medications_router(state: &AppState) -> Router<AppState> {
    let cfg = &state.config.cache;

    let routes = Router::new()
        .route("/", get(medications::list).post(medications::create))
        .route(
            "/{id}",
            get(medications::get)
                .put(medications::update)
                .delete(medications::delete),
        );

    invalidating(
        state,
        MEDICATION_PATTERNS,
        cached(state, "medicamentos", cfg.default_ttl_secs, routes),
    )
}

fn vet_records_router(state: &AppState) -> Router<AppState> {
    let cfg = &state.config.cache;

    let routes = Router::new()
        .route("/", get(vet_records::list).post(vet_records::create))
        .route(
            "/{id}",
            get(vet_records::get)
                .put(vet_records::update)
                .delete(vet_records::delete),
        )
        .route(
            "/{id}/medicamentos",
            get(vet_records::medications).post(vet_records::add_medication),
        )
        .route(
            "/{id}/medicamentos/{medicamento_id}",
            delete(vet_records::remove_medication),
        );

    invalidating(
        state,
        VET_PATTERNS,
        cached(state, "veterinaria", cfg.default_ttl_secs, routes),
    )
}

fn sales_router(state: &AppState) -> Router<AppState> {
    let cfg = &state.config.cache;

    let routes = Router::new()
        .route("/", get(sales::list).post(sales::create))
        .route("/stats", get(sales::stats))
        .route("/comprador/{comprador}", get(sales::by_buyer))
        .route(
            "/{id}",
            get(sales::get).put(sales::update).delete(sales::delete),
        )
        .route("/{id}/ganado", get(sales::cattle).post(sales::add_cattle));

    invalidating(
        state,
        SALE_PATTERNS,
        cached(state, "ventas", cfg.default_ttl_secs, routes),
    )
}

fn memberships_router(state: &AppState) -> Router<AppState> {
    let routes = Router::new()
        .route("/asociar", post(memberships::associate))
        .route("/desasociar", post(memberships::dissociate))
        .route("/usuario/{id_usuario}", get(memberships::farms_by_user))
        .route("/finca/{id_finca}", get(memberships::users_by_farm))
        .route(
            "/finca/{id_finca}/propietarios",
            get(memberships::owners_by_farm),
        );

    invalidating(state, MEMBERSHIP_PATTERNS, routes)
}

fn link_codes_router(state: &AppState) -> Router<AppState> {
    // Redemption creates a membership, so it clears the same patterns as a
    // direct association.
    let verify = invalidating(
        state,
        MEMBERSHIP_PATTERNS,
        Router::new().route("/verificar", post(link_codes::verify)),
    );

    Router::new()
        .route("/generar", post(link_codes::generate))
        .route("/finca/{id_finca}", get(link_codes::by_farm))
        .route(
            "/codigo/{codigo}/finca/{id_finca}",
            delete(link_codes::revoke),
        )
        .merge(verify)
}

// =============================================================================
// Server
// =============================================================================

pub struct CowtrackerServer {
    addr: SocketAddr,
    app: Router,
}

impl CowtrackerServer {
    pub fn new(state: AppState) -> Self {
        let addr = state.config.addr();
        Self {
            addr,
            app: build_app(state),
        }
    }

    pub async fn run(self) -> anyhow::Result<()> {
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await?;
        Ok(())
    }
}

async fn shutdown_signal() {
    // Wait for Ctrl+C
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
