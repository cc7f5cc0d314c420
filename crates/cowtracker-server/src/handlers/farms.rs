//! Farm endpoints (`/api/farms`).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::{Deserialize, Serialize};
use serde_json::json;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use cowtracker_api::ApiError;
use cowtracker_core::role::{ROLE_ID_VETERINARIAN, ROLE_ID_WORKER};
use cowtracker_storage::{CattleRow, CattleStorage, FarmStorage, MembershipStorage};

use super::storage_error;
use crate::auth::CurrentUser;
use crate::state::AppState;

/// GET /api/farms - Farms the caller belongs to.
pub async fn list(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let farms = MembershipStorage::new(&state.pool)
        .farms_by_user(user.user_id)
        .await
        .map_err(storage_error)?;

    Ok(Json(farms))
}

/// GET /api/farms/{id} - Read a farm.
pub async fn get(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let farm = FarmStorage::new(&state.pool)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Finca no encontrada"))?;

    Ok(Json(farm))
}

#[derive(Debug, Deserialize)]
pub struct CreateFarmRequest {
    pub nombre: Option<String>,
    /// Legacy alias accepted from older clients.
    pub name: Option<String>,
    pub tamano: Option<f64>,
    pub size: Option<f64>,
}

/// POST /api/farms - Create a farm owned by the caller.
pub async fn create(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<CreateFarmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(nombre) = request.nombre.or(request.name) else {
        return Err(ApiError::bad_request("El nombre de la finca es obligatorio"));
    };
    let tamano = request.tamano.or(request.size).unwrap_or(0.0);

    let farm = FarmStorage::new(&state.pool)
        .create(&nombre, tamano, Some(user.user_id))
        .await
        .map_err(storage_error)?;

    // Link the creator so the farm shows up in their listing; the farm row
    // itself is already committed, so a link failure is logged, not fatal.
    if let Err(e) = MembershipStorage::new(&state.pool)
        .upsert(user.user_id, farm.id_finca)
        .await
    {
        tracing::warn!(id_finca = farm.id_finca, error = %e, "failed to link farm creator");
    }

    tracing::info!(id_finca = farm.id_finca, nombre = %farm.nombre, "farm created");

    Ok((StatusCode::CREATED, Json(farm)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateFarmRequest {
    pub nombre: Option<String>,
    pub name: Option<String>,
    pub tamano: Option<f64>,
    pub size: Option<f64>,
}

/// PUT /api/farms/{id} - Update a farm.
pub async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<UpdateFarmRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let nombre = request.nombre.or(request.name);
    let tamano = request.tamano.or(request.size);
    if nombre.is_none() && tamano.is_none() {
        return Err(ApiError::bad_request(
            "No se proporcionaron datos para actualizar",
        ));
    }

    let farm = FarmStorage::new(&state.pool)
        .update(id, nombre.as_deref(), tamano)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Finca no encontrada"))?;

    tracing::info!(id_finca = id, "farm updated");

    Ok(Json(farm))
}

/// DELETE /api/farms/{id} - Delete a farm.
pub async fn delete(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = FarmStorage::new(&state.pool)
        .delete(id)
        .await
        .map_err(storage_error)?;

    if !deleted {
        return Err(ApiError::not_found("Finca no encontrada"));
    }

    tracing::info!(id_finca = id, "farm deleted");

    Ok(Json(json!({ "message": "Finca eliminada" })))
}

#[derive(Debug, Serialize)]
pub struct FarmCattleResponse {
    pub success: bool,
    pub data: Vec<CattleRow>,
    pub message: String,
    pub metadata: serde_json::Value,
}

/// GET /api/farms/{id}/cattle - Cattle of a farm.
pub async fn cattle(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    if !FarmStorage::new(&state.pool)
        .exists(id)
        .await
        .map_err(storage_error)?
    {
        return Err(ApiError::not_found(format!("La finca {id} no existe")));
    }

    let cattle = CattleStorage::new(&state.pool)
        .list_by_farm(id)
        .await
        .map_err(storage_error)?;

    let message = if cattle.is_empty() {
        format!("No se encontró ganado para la finca {id}")
    } else {
        format!("Se encontraron {} registros de ganado", cattle.len())
    };
    let timestamp = OffsetDateTime::now_utc()
        .format(&Rfc3339)
        .unwrap_or_default();

    Ok(Json(FarmCattleResponse {
        success: true,
        message,
        metadata: json!({
            "farmId": id,
            "count": cattle.len(),
            "userId": user.auth_id,
            "timestamp": timestamp,
        }),
        data: cattle,
    }))
}

/// GET /api/farms/{id}/workers - Farm members holding the worker role.
pub async fn workers(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let members = MembershipStorage::new(&state.pool)
        .members_by_farm_role(id, ROLE_ID_WORKER)
        .await
        .map_err(storage_error)?;

    Ok(Json(members))
}

/// GET /api/farms/{id}/veterinarians - Farm members holding the
/// veterinarian role.
pub async fn veterinarians(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let members = MembershipStorage::new(&state.pool)
        .members_by_farm_role(id, ROLE_ID_VETERINARIAN)
        .await
        .map_err(storage_error)?;

    Ok(Json(members))
}

/// POST/DELETE /api/farms/{id}/workers|veterinarians - Direct member
/// management is intentionally unsupported; members are attached through
/// link codes.
pub async fn member_management_unsupported(
    _user: CurrentUser,
) -> Result<axum::response::Response, ApiError> {
    Err(ApiError::not_implemented(
        "Funcionalidad no implementada; use códigos de vinculación",
    ))
}
