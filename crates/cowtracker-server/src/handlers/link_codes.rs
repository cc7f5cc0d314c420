//! Link-code endpoints (`/api/vincular`).

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde::Deserialize;

use cowtracker_api::{ApiError, Envelope};
use cowtracker_core::LinkRole;

use crate::auth::CurrentUser;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateCodeRequest {
    #[serde(rename = "idFinca")]
    pub id_finca: Option<i64>,
    pub tipo: Option<String>,
    #[serde(rename = "duracionMinutos")]
    pub duracion_minutos: Option<i64>,
}

/// POST /api/vincular/generar - Issue a link code for a farm.
pub async fn generate(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<GenerateCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(id_finca), Some(tipo)) = (request.id_finca, request.tipo.as_deref()) else {
        return Err(ApiError::bad_request(
            "Se requiere idFinca y tipo (trabajador o veterinario)",
        ));
    };

    let tipo: LinkRole = tipo.parse().map_err(|_| {
        ApiError::bad_request("Tipo de usuario inválido. Debe ser: trabajador o veterinario")
    })?;

    let issued = state
        .link_codes
        .issue(id_finca, tipo, request.duracion_minutos)
        .await?;

    Ok((StatusCode::CREATED, Envelope::data(issued)))
}

#[derive(Debug, Deserialize)]
pub struct VerifyCodeRequest {
    pub codigo: Option<String>,
}

/// POST /api/vincular/verificar - Redeem a code for the calling user.
pub async fn verify(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<VerifyCodeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(codigo) = request.codigo else {
        return Err(ApiError::bad_request("Se requiere el código de vinculación"));
    };

    let redemption = state.link_codes.redeem(&codigo, user.auth_id).await?;

    Ok(Envelope::with_message(redemption, "Vinculación exitosa"))
}

/// GET /api/vincular/finca/{idFinca} - List a farm's active codes.
pub async fn by_farm(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id_finca): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let codes = state.link_codes.list_active(id_finca);
    Ok(Envelope::data(codes))
}

/// DELETE /api/vincular/codigo/{codigo}/finca/{idFinca} - Revoke a code.
pub async fn revoke(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path((codigo, id_finca)): Path<(String, i64)>,
) -> Result<impl IntoResponse, ApiError> {
    if !state.link_codes.revoke(&codigo, id_finca) {
        return Err(ApiError::not_found(
            "Código no encontrado o no pertenece a la finca especificada",
        ));
    }

    Ok(Envelope::message_only("Código eliminado correctamente"))
}
