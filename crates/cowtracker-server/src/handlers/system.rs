//! Health, info, and cache administration endpoints.

use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use cowtracker_api::ApiError;

use crate::state::AppState;

/// GET / - Service banner.
pub async fn root() -> impl IntoResponse {
    Json(json!({ "message": "API de CowTracker funcionando correctamente" }))
}

/// GET /api/test - Connectivity check.
pub async fn api_test() -> impl IntoResponse {
    Json(json!({ "status": "ok", "message": "Conexión exitosa al backend" }))
}

/// GET /api/cache/stats - Cache statistics snapshot.
pub async fn cache_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.cache.stats().await;
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .map_err(|e| ApiError::internal(e.to_string()))?;

    Ok(Json(json!({
        "status": "ok",
        "cache": stats,
        "timestamp": timestamp,
    })))
}

#[derive(Debug, Deserialize)]
pub struct ClearCacheRequest {
    #[serde(default)]
    pub pattern: Option<String>,
}

/// POST /api/cache/clear - Clear cached entries matching a pattern, or all
/// entries when no pattern is given.
pub async fn cache_clear(
    State(state): State<AppState>,
    Json(request): Json<ClearCacheRequest>,
) -> impl IntoResponse {
    match request.pattern {
        Some(ref pattern) if !pattern.is_empty() => {
            state.cache.invalidate_pattern(pattern).await;
            Json(json!({
                "status": "ok",
                "message": format!("Caché limpiado para patrón: {pattern}"),
            }))
        }
        _ => {
            // An empty substring matches every key.
            state.cache.invalidate_pattern("").await;
            Json(json!({
                "status": "ok",
                "message": "Todo el caché ha sido limpiado",
            }))
        }
    }
}
