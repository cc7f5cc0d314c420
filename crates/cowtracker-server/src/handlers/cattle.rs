//! Cattle endpoints (`/api/cattle`).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;
use serde_json::json;
use time::OffsetDateTime;

use cowtracker_api::ApiError;
use cowtracker_storage::{CattleStorage, NewCattle, NewVetRecord, UpdateCattle, VetRecordStorage};

use super::storage_error;
use crate::auth::CurrentUser;
use crate::state::AppState;

/// GET /api/cattle - List all cattle.
pub async fn list(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let cattle = CattleStorage::new(&state.pool)
        .list()
        .await
        .map_err(storage_error)?;

    Ok(Json(cattle))
}

/// GET /api/cattle/with-farm-info - List all cattle with their farm
/// embedded.
pub async fn list_with_farm_info(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let cattle = CattleStorage::new(&state.pool)
        .list_with_farm()
        .await
        .map_err(storage_error)?;

    Ok(Json(cattle))
}

/// GET /api/cattle/{id} - Read a cattle record.
pub async fn get(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let cattle = CattleStorage::new(&state.pool)
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Ganado no encontrado"))?;

    Ok(Json(cattle))
}

#[derive(Debug, Deserialize)]
pub struct CattleRequest {
    pub nombre: Option<String>,
    pub numero_identificacion: Option<i64>,
    pub precio_compra: Option<f64>,
    pub nota: Option<String>,
    pub id_finca: Option<i64>,
    pub id_informacion_veterinaria: Option<i64>,
    pub id_estado_salud: Option<i32>,
    pub id_genero: Option<i32>,
    pub id_produccion: Option<i64>,
}

/// POST /api/cattle - Create a cattle record.
pub async fn create(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<CattleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(nombre) = request.nombre.filter(|n| !n.is_empty()) else {
        return Err(ApiError::bad_request("El nombre del ganado es obligatorio"));
    };

    let cattle = CattleStorage::new(&state.pool)
        .create(&NewCattle {
            nombre,
            numero_identificacion: request.numero_identificacion,
            precio_compra: request.precio_compra,
            nota: request.nota,
            id_finca: request.id_finca,
            id_informacion_veterinaria: request.id_informacion_veterinaria,
            id_estado_salud: request.id_estado_salud,
            id_genero: request.id_genero,
            id_produccion: request.id_produccion,
        })
        .await
        .map_err(storage_error)?;

    tracing::info!(id_ganado = cattle.id_ganado, "cattle created");

    Ok((StatusCode::CREATED, Json(cattle)))
}

/// PUT /api/cattle/{id} - Update a cattle record.
pub async fn update(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<CattleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cattle = CattleStorage::new(&state.pool)
        .update(
            id,
            &UpdateCattle {
                nombre: request.nombre,
                numero_identificacion: request.numero_identificacion,
                precio_compra: request.precio_compra,
                nota: request.nota,
                id_finca: request.id_finca,
                id_informacion_veterinaria: request.id_informacion_veterinaria,
                id_estado_salud: request.id_estado_salud,
                id_genero: request.id_genero,
                id_produccion: request.id_produccion,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Ganado no encontrado"))?;

    tracing::info!(id_ganado = id, "cattle updated");

    Ok(Json(cattle))
}

/// DELETE /api/cattle/{id} - Delete a cattle record.
pub async fn delete(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = CattleStorage::new(&state.pool)
        .delete(id)
        .await
        .map_err(storage_error)?;

    if !deleted {
        return Err(ApiError::not_found("Ganado no encontrado"));
    }

    tracing::info!(id_ganado = id, "cattle deleted");

    Ok(Json(json!({ "message": "Ganado eliminado" })))
}

#[derive(Debug, Deserialize)]
pub struct MedicalRecordRequest {
    #[serde(default, with = "time::serde::rfc3339::option")]
    pub fecha_tratamiento: Option<OffsetDateTime>,
    pub diagnostico: Option<String>,
    pub tratamiento: Option<String>,
    pub nota: Option<String>,
}

/// POST /api/cattle/{id}/medical - Attach a veterinary record to a cattle
/// record.
pub async fn add_medical_record(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
    Json(request): Json<MedicalRecordRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cattle_storage = CattleStorage::new(&state.pool);
    cattle_storage
        .find_by_id(id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Ganado no encontrado"))?;

    let record = VetRecordStorage::new(&state.pool)
        .create(&NewVetRecord {
            fecha_tratamiento: request.fecha_tratamiento,
            diagnostico: request.diagnostico,
            tratamiento: request.tratamiento,
            nota: request.nota,
        })
        .await
        .map_err(storage_error)?;

    cattle_storage
        .set_vet_record(id, record.id_informacion_veterinaria)
        .await
        .map_err(storage_error)?;

    tracing::info!(
        id_ganado = id,
        id_informacion_veterinaria = record.id_informacion_veterinaria,
        "medical record attached"
    );

    Ok((StatusCode::CREATED, Json(record)))
}

/// GET /api/cattle/{id}/medical-records - Veterinary records linked to a
/// cattle record.
pub async fn medical_records(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let records = VetRecordStorage::new(&state.pool)
        .list_by_cattle(id)
        .await
        .map_err(storage_error)?;

    Ok(Json(records))
}
