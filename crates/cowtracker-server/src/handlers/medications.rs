//! Medication endpoints (`/api/medicamentos`).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;

use cowtracker_api::ApiError;
use cowtracker_storage::MedicationStorage;

use super::storage_error;
use crate::auth::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MedicationRequest {
    pub nombre: Option<String>,
    pub dosis: Option<String>,
    pub horas: Option<String>,
}

/// GET /api/medicamentos - List medications.
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let medications = MedicationStorage::new(&state.pool)
        .list()
        .await
        .map_err(storage_error)?;

    Ok(Json(medications))
}

/// GET /api/medicamentos/{id} - Read a medication.
pub async fn get(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let medication = MedicationStorage::new(&state.pool)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Medicamento no encontrado"))?;

    Ok(Json(medication))
}

/// POST /api/medicamentos - Create a medication.
pub async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<MedicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(nombre) = request.nombre.filter(|n| !n.is_empty()) else {
        return Err(ApiError::bad_request(
            "El nombre del medicamento es obligatorio",
        ));
    };

    let medication = MedicationStorage::new(&state.pool)
        .create(
            &nombre,
            request.dosis.as_deref().unwrap_or(""),
            request.horas.as_deref().unwrap_or(""),
        )
        .await
        .map_err(storage_error)?;

    tracing::info!(id_medicamento = medication.id_medicamento, "medication created");

    Ok((StatusCode::CREATED, Json(medication)))
}

/// PUT /api/medicamentos/{id} - Update a medication.
pub async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<MedicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let medication = MedicationStorage::new(&state.pool)
        .update(
            id,
            request.nombre.as_deref(),
            request.dosis.as_deref(),
            request.horas.as_deref(),
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Medicamento no encontrado"))?;

    Ok(Json(medication))
}

/// DELETE /api/medicamentos/{id} - Delete a medication.
pub async fn delete(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = MedicationStorage::new(&state.pool)
        .delete(id)
        .await
        .map_err(storage_error)?;

    if !deleted {
        return Err(ApiError::not_found("Medicamento no encontrado"));
    }

    Ok(Json(json!({ "message": "Medicamento eliminado" })))
}
