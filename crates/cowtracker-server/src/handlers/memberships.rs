//! Farm membership endpoints (`/api/usuario-finca`).

use axum::Json;
use axum::extract::{Path, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use uuid::Uuid;

use cowtracker_api::{ApiError, Envelope};
use cowtracker_storage::{FarmStorage, MembershipStorage, PgPool, UserStorage};

use super::storage_error;
use crate::auth::CurrentUser;
use crate::state::AppState;

/// A user reference: either the numeric `id_usuario` or the identity
/// provider's UUID.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum UserRef {
    Numeric(i64),
    Auth(String),
}

/// Resolve a user reference to the numeric `id_usuario`.
async fn resolve_user_id(pool: &PgPool, user_ref: &UserRef) -> Result<i64, ApiError> {
    match user_ref {
        UserRef::Numeric(id) => Ok(*id),
        UserRef::Auth(raw) => {
            let auth_id = Uuid::parse_str(raw)
                .map_err(|_| ApiError::bad_request("id_usuario inválido"))?;
            let profile = UserStorage::new(pool)
                .find_by_auth_id(auth_id)
                .await
                .map_err(storage_error)?
                .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;
            Ok(profile.user.id_usuario)
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct MembershipRequest {
    pub id_usuario: Option<UserRef>,
    pub id_finca: Option<i64>,
}

/// POST /api/usuario-finca/asociar - Link a user to a farm.
pub async fn associate(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<MembershipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(user_ref), Some(id_finca)) = (request.id_usuario, request.id_finca) else {
        return Err(ApiError::bad_request("Se requieren id_usuario e id_finca"));
    };

    let id_usuario = resolve_user_id(&state.pool, &user_ref).await?;

    if FarmStorage::new(&state.pool)
        .find_by_id(id_finca)
        .await
        .map_err(storage_error)?
        .is_none()
    {
        return Err(ApiError::not_found("Finca no encontrada"));
    }

    let membership = MembershipStorage::new(&state.pool)
        .upsert(id_usuario, id_finca)
        .await
        .map_err(storage_error)?;

    tracing::info!(id_usuario, id_finca, "user associated to farm");

    Ok(Envelope::data(membership))
}

/// POST /api/usuario-finca/desasociar - Unlink a user from a farm.
pub async fn dissociate(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<MembershipRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(user_ref), Some(id_finca)) = (request.id_usuario, request.id_finca) else {
        return Err(ApiError::bad_request("Se requieren id_usuario e id_finca"));
    };

    let id_usuario = resolve_user_id(&state.pool, &user_ref).await?;

    MembershipStorage::new(&state.pool)
        .remove(id_usuario, id_finca)
        .await
        .map_err(storage_error)?;

    tracing::info!(id_usuario, id_finca, "user dissociated from farm");

    Ok(Envelope::message_only(
        "Usuario desasociado de la finca correctamente",
    ))
}

/// GET /api/usuario-finca/usuario/{id_usuario} - Farms of a user.
pub async fn farms_by_user(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id_usuario): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_ref = match id_usuario.parse::<i64>() {
        Ok(id) => UserRef::Numeric(id),
        Err(_) => UserRef::Auth(id_usuario),
    };
    let id_usuario = resolve_user_id(&state.pool, &user_ref).await?;

    let farms = MembershipStorage::new(&state.pool)
        .farms_by_user(id_usuario)
        .await
        .map_err(storage_error)?;

    Ok(Envelope::data(farms))
}

/// GET /api/usuario-finca/finca/{id_finca} - Members of a farm.
pub async fn users_by_farm(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id_finca): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let members = MembershipStorage::new(&state.pool)
        .users_by_farm(id_finca)
        .await
        .map_err(storage_error)?;

    Ok(Envelope::data(members))
}

/// GET /api/usuario-finca/finca/{id_finca}/propietarios - Owners of a farm.
pub async fn owners_by_farm(
    State(state): State<AppState>,
    _user: CurrentUser,
    Path(id_finca): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let owners = MembershipStorage::new(&state.pool)
        .owners_by_farm(id_finca)
        .await
        .map_err(storage_error)?;

    Ok(Envelope::data(owners))
}
