//! Router-level tests for the endpoints that do not need a database:
//! service banner, cache administration, and the authentication gate.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use cowtracker_core::SystemClock;
use cowtracker_server::auth::{
    AuthIdentity, AuthProviderError, AuthSession, AuthState, IdentityProvider,
};
use cowtracker_server::cache::ResponseCache;
use cowtracker_server::config::AppConfig;
use cowtracker_server::link_codes::{LinkCodeService, PgFarmLookup, PgMembershipLink};
use cowtracker_server::{AppState, build_app};

/// Provider that rejects every token; none of these tests get past auth.
struct RejectAll;

#[async_trait]
impl IdentityProvider for RejectAll {
    async fn verify_token(&self, _token: &str) -> Result<AuthIdentity, AuthProviderError> {
        Err(AuthProviderError::InvalidToken)
    }

    async fn sign_up(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<AuthSession, AuthProviderError> {
        Err(AuthProviderError::Upstream("not wired in tests".into()))
    }

    async fn sign_in(
        &self,
        _email: &str,
        _password: &str,
    ) -> Result<AuthSession, AuthProviderError> {
        Err(AuthProviderError::InvalidCredentials)
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<AuthSession, AuthProviderError> {
        Err(AuthProviderError::InvalidToken)
    }
}

fn test_state() -> AppState {
    // A lazy pool never connects unless a query runs; these tests stay away
    // from storage-backed routes.
    let pool = Arc::new(
        sqlx_core::pool::PoolOptions::<sqlx_postgres::Postgres>::new()
            .connect_lazy("postgres://localhost/cowtracker_test")
            .expect("lazy pool"),
    );

    let link_codes = Arc::new(LinkCodeService::new(
        Arc::new(PgFarmLookup::new(Arc::clone(&pool))),
        Arc::new(PgMembershipLink::new(Arc::clone(&pool))),
        Arc::new(SystemClock),
        Duration::from_secs(3600),
    ));

    AppState {
        config: Arc::new(AppConfig::default()),
        pool: Arc::clone(&pool),
        cache: Arc::new(ResponseCache::new_local()),
        link_codes,
        auth: AuthState::new(Arc::new(RejectAll), pool),
    }
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("read body");
    serde_json::from_slice(&bytes).expect("json body")
}

#[tokio::test]
async fn root_banner() {
    let app = build_app(test_state());
    let response = app
        .oneshot(Request::get("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "API de CowTracker funcionando correctamente");
}

#[tokio::test]
async fn api_test_endpoint() {
    let app = build_app(test_state());
    let response = app
        .oneshot(Request::get("/api/test").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
}

#[tokio::test]
async fn cache_stats_snapshot() {
    let state = test_state();
    state
        .cache
        .set("farms_u1_{}", b"[]".to_vec(), Duration::from_secs(900))
        .await;

    let app = build_app(state);
    let response = app
        .oneshot(
            Request::get("/api/cache/stats")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["cache"]["memory"]["keys"], 1);
    assert_eq!(json["cache"]["redis"]["connected"], false);
    assert!(json["timestamp"].is_string());
}

#[tokio::test]
async fn cache_clear_with_pattern_removes_matching_keys() {
    let state = test_state();
    state
        .cache
        .set("cattle_u1_{}", b"a".to_vec(), Duration::from_secs(600))
        .await;
    state
        .cache
        .set("farms_u1_{}", b"b".to_vec(), Duration::from_secs(900))
        .await;
    let cache = Arc::clone(&state.cache);

    let app = build_app(state);
    let response = app
        .oneshot(
            Request::post("/api/cache/clear")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"pattern":"cattle_"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(cache.get("cattle_u1_{}").await.is_none());
    assert!(cache.get("farms_u1_{}").await.is_some());
}

#[tokio::test]
async fn cache_clear_without_pattern_removes_everything() {
    let state = test_state();
    state
        .cache
        .set("cattle_u1_{}", b"a".to_vec(), Duration::from_secs(600))
        .await;
    state
        .cache
        .set("ventas_u2_{}", b"b".to_vec(), Duration::from_secs(300))
        .await;
    let cache = Arc::clone(&state.cache);

    let app = build_app(state);
    let response = app
        .oneshot(
            Request::post("/api/cache/clear")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from("{}"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["message"], "Todo el caché ha sido limpiado");
    assert!(cache.get("cattle_u1_{}").await.is_none());
    assert!(cache.get("ventas_u2_{}").await.is_none());
}

#[tokio::test]
async fn protected_routes_require_a_bearer_token() {
    for uri in ["/api/farms", "/api/cattle", "/api/users/profile"] {
        let app = build_app(test_state());
        let response = app
            .oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "uri {uri}");
        let json = body_json(response).await;
        assert_eq!(json["success"], false);
        assert!(json["message"].is_string());
    }
}

#[tokio::test]
async fn invalid_token_is_rejected() {
    let app = build_app(test_state());
    let response = app
        .oneshot(
            Request::post("/api/vincular/generar")
                .header(header::AUTHORIZATION, "Bearer expired-token")
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(r#"{"idFinca":42,"tipo":"trabajador"}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}
