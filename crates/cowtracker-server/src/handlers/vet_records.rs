//! Veterinary record endpoints (`/api/veterinary`).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use cowtracker_api::ApiError;
use cowtracker_storage::{NewVetRecord, VetRecordStorage};

use super::storage_error;
use crate::auth::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VetRecordRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub fecha_tratamiento: Option<OffsetDateTime>,
    pub diagnostico: Option<String>,
    pub tratamiento: Option<String>,
    pub nota: Option<String>,
}

impl VetRecordRequest {
    fn into_record(self) -> NewVetRecord {
        NewVetRecord {
            fecha_tratamiento: self.fecha_tratamiento,
            diagnostico: self.diagnostico,
            tratamiento: self.tratamiento,
            nota: self.nota,
        }
    }
}

/// GET /api/veterinary - List veterinary records.
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let records = VetRecordStorage::new(&state.pool)
        .list()
        .await
        .map_err(storage_error)?;

    Ok(Json(records))
}

/// GET /api/veterinary/{id} - Read a veterinary record.
pub async fn get(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let record = VetRecordStorage::new(&state.pool)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Información veterinaria no encontrada"))?;

    Ok(Json(record))
}

/// POST /api/veterinary - Create a veterinary record.
pub async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<VetRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = VetRecordStorage::new(&state.pool)
        .create(&request.into_record())
        .await
        .map_err(storage_error)?;

    tracing::info!(
        id_informacion_veterinaria = record.id_informacion_veterinaria,
        "veterinary record created"
    );

    Ok((StatusCode::CREATED, Json(record)))
}

/// PUT /api/veterinary/{id} - Update a veterinary record.
pub async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<VetRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let record = VetRecordStorage::new(&state.pool)
        .update(id, &request.into_record())
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Información veterinaria no encontrada"))?;

    Ok(Json(record))
}

/// DELETE /api/veterinary/{id} - Delete a veterinary record.
pub async fn delete(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = VetRecordStorage::new(&state.pool)
        .delete(id)
        .await
        .map_err(storage_error)?;

    if !deleted {
        return Err(ApiError::not_found("Información veterinaria no encontrada"));
    }

    Ok(Json(json!({ "message": "Información veterinaria eliminada" })))
}

#[derive(Debug, Deserialize)]
pub struct AddMedicationRequest {
    pub id_medicamento: Option<i64>,
}

/// POST /api/veterinary/{id}/medicamentos - Link a medication to a
/// treatment.
pub async fn add_medication(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<AddMedicationRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(id_medicamento) = request.id_medicamento else {
        return Err(ApiError::bad_request("Se requiere id_medicamento"));
    };

    let storage = VetRecordStorage::new(&state.pool);
    storage
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Información veterinaria no encontrada"))?;

    let link = storage
        .add_medication(id, id_medicamento)
        .await
        .map_err(storage_error)?;

    Ok((StatusCode::CREATED, Json(link)))
}

/// GET /api/veterinary/{id}/medicamentos - Medications linked to a
/// treatment.
pub async fn medications(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let links = VetRecordStorage::new(&state.pool)
        .medications(id)
        .await
        .map_err(storage_error)?;

    Ok(Json(links))
}

/// DELETE /api/veterinary/{id}/medicamentos/{medicamentoId} - Unlink a
/// medication from a treatment.
pub async fn remove_medication(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((id, id_medicamento)): Path<(i64, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    let removed = VetRecordStorage::new(&state.pool)
        .remove_medication(id, id_medicamento)
        .await
        .map_err(storage_error)?;

    if !removed {
        return Err(ApiError::not_found(
            "Medicamento no asociado a este tratamiento",
        ));
    }

    Ok(Json(json!({ "message": "Medicamento eliminado del tratamiento" })))
}
