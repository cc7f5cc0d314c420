//! User endpoints (`/api/users`).

use std::sync::LazyLock;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use cowtracker_api::{ApiError, Envelope};
use cowtracker_core::UserRole;
use cowtracker_storage::{
    NewUserProfile, PremiumStorage, UpdateUserProfile, UserProfileRow, UserStorage,
};

use super::storage_error;
use crate::auth::{AdminUser, CurrentUser};
use crate::state::AppState;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email regex")
});

/// Split a display name into the four stored name components.
fn split_name(name: &str) -> (String, Option<String>, String, Option<String>) {
    let parts: Vec<&str> = name.split_whitespace().collect();
    match parts.len() {
        0 => (String::new(), None, String::new(), None),
        1 => (parts[0].into(), None, String::new(), None),
        2 => (parts[0].into(), None, parts[1].into(), None),
        3 => (parts[0].into(), Some(parts[1].into()), parts[2].into(), None),
        _ => (
            parts[0].into(),
            Some(parts[1].into()),
            parts[2].into(),
            Some(parts[3].into()),
        ),
    }
}

fn full_name(profile: &UserProfileRow) -> String {
    format!(
        "{} {}",
        profile.user.primer_nombre, profile.user.primer_apellido
    )
}

// =============================================================================
// Register / Login / Refresh
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub role: Option<String>,
    pub primer_nombre: Option<String>,
    pub segundo_nombre: Option<String>,
    pub primer_apellido: Option<String>,
    pub segundo_apellido: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub uid: Uuid,
    pub email: String,
    pub role: String,
    pub name: String,
    pub primer_nombre: String,
    pub segundo_nombre: String,
    pub primer_apellido: String,
    pub segundo_apellido: String,
    pub id_usuario: i64,
    pub token: String,
}

/// POST /api/users/register - Create a provider account and its profile.
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (request.email, request.password) else {
        return Err(ApiError::bad_request(
            "Por favor ingrese los campos requeridos: email, contraseña",
        ));
    };

    let has_split_name = request.primer_nombre.is_some() && request.primer_apellido.is_some();
    if !has_split_name && request.name.is_none() {
        return Err(ApiError::bad_request(
            "Por favor ingrese los campos requeridos: nombre, apellido",
        ));
    }

    let email = email.to_lowercase();
    if !EMAIL_RE.is_match(&email) {
        return Err(ApiError::bad_request(
            "Por favor ingrese un correo electrónico válido",
        ));
    }
    if password.len() < 6 {
        return Err(ApiError::bad_request(
            "La contraseña debe tener al menos 6 caracteres",
        ));
    }

    let (primer_nombre, segundo_nombre, primer_apellido, segundo_apellido) = if has_split_name {
        (
            request.primer_nombre.unwrap_or_default(),
            request.segundo_nombre,
            request.primer_apellido.unwrap_or_default(),
            request.segundo_apellido,
        )
    } else {
        split_name(request.name.as_deref().unwrap_or_default())
    };

    let role: UserRole = request
        .role
        .as_deref()
        .unwrap_or("user")
        .parse()
        .map_err(|_| ApiError::bad_request("Rol inválido"))?;

    let session = state.auth.provider.sign_up(&email, &password).await?;

    let profile = UserStorage::new(&state.pool)
        .create_profile(&NewUserProfile {
            id_autentificar: session.user.id,
            correo: email.clone(),
            primer_nombre: primer_nombre.clone(),
            segundo_nombre: segundo_nombre.clone(),
            primer_apellido: primer_apellido.clone(),
            segundo_apellido: segundo_apellido.clone(),
            id_rol: role.id(),
            id_premium: 1,
        })
        .await
        .map_err(storage_error)?;

    tracing::info!(uid = %session.user.id, email = %email, "user registered");

    Ok((
        StatusCode::CREATED,
        Json(SessionResponse {
            uid: session.user.id,
            email,
            role: role.label().to_string(),
            name: format!("{primer_nombre} {primer_apellido}"),
            primer_nombre,
            segundo_nombre: segundo_nombre.unwrap_or_default(),
            primer_apellido,
            segundo_apellido: segundo_apellido.unwrap_or_default(),
            id_usuario: profile.id_usuario,
            token: session.access_token.unwrap_or_default(),
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: Option<String>,
    pub password: Option<String>,
}

/// POST /api/users/login - Password sign-in.
pub async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (Some(email), Some(password)) = (request.email, request.password) else {
        return Err(ApiError::bad_request("Por favor ingrese correo y contraseña"));
    };

    let email = email.to_lowercase();
    let session = state.auth.provider.sign_in(&email, &password).await?;

    let profile = UserStorage::new(&state.pool)
        .find_by_auth_id(session.user.id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    let role = UserRole::from_id(profile.user.id_rol);

    Ok(Json(SessionResponse {
        uid: session.user.id,
        email,
        role: role.label().to_string(),
        name: full_name(&profile),
        primer_nombre: profile.user.primer_nombre,
        segundo_nombre: profile.user.segundo_nombre.unwrap_or_default(),
        primer_apellido: profile.user.primer_apellido,
        segundo_apellido: profile.user.segundo_apellido.unwrap_or_default(),
        id_usuario: profile.user.id_usuario,
        token: session.access_token.unwrap_or_default(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: Option<String>,
}

/// POST /api/users/refresh-token - Exchange a refresh token.
pub async fn refresh_token(
    State(state): State<AppState>,
    _user: CurrentUser,
    Json(request): Json<RefreshRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(refresh_token) = request.refresh_token else {
        return Err(ApiError::bad_request("Se requiere refresh_token"));
    };

    let session = state.auth.provider.refresh(&refresh_token).await?;

    Ok(Json(serde_json::json!({
        "token": session.access_token,
    })))
}

// =============================================================================
// Profile
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub uid: Uuid,
    pub name: String,
    pub email: String,
    pub role: String,
    pub id_rol: i32,
    pub primer_nombre: String,
    pub segundo_nombre: String,
    pub primer_apellido: String,
    pub segundo_apellido: String,
    pub id_usuario: i64,
    pub id_premium: i32,
    pub is_premium: i32,
    pub premium_type: String,
}

fn profile_response(profile: UserProfileRow) -> ProfileResponse {
    let role = UserRole::from_id(profile.user.id_rol);
    ProfileResponse {
        uid: profile.user.id_autentificar,
        name: full_name(&profile),
        email: profile.correo.clone().unwrap_or_default(),
        role: role.label().to_string(),
        id_rol: profile.user.id_rol,
        primer_nombre: profile.user.primer_nombre,
        segundo_nombre: profile.user.segundo_nombre.unwrap_or_default(),
        primer_apellido: profile.user.primer_apellido,
        segundo_apellido: profile.user.segundo_apellido.unwrap_or_default(),
        id_usuario: profile.user.id_usuario,
        id_premium: profile.user.id_premium,
        is_premium: i32::from(profile.user.id_premium == 2),
        premium_type: profile
            .premium_descripcion
            .unwrap_or_else(|| "Free".to_string()),
    }
}

/// GET /api/users/profile - The caller's profile.
pub async fn get_profile(
    State(state): State<AppState>,
    user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let profile = UserStorage::new(&state.pool)
        .find_by_auth_id(user.auth_id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    Ok(Json(profile_response(profile)))
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub primer_nombre: Option<String>,
    pub segundo_nombre: Option<String>,
    pub primer_apellido: Option<String>,
    pub segundo_apellido: Option<String>,
    pub id_premium: Option<i32>,
    pub is_premium: Option<i32>,
}

/// PUT /api/users/profile - Update the caller's profile.
pub async fn update_profile(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (primer_nombre, segundo_nombre, primer_apellido, segundo_apellido) =
        if request.primer_nombre.is_some() || request.primer_apellido.is_some() {
            (
                request.primer_nombre,
                request.segundo_nombre,
                request.primer_apellido,
                request.segundo_apellido,
            )
        } else if let Some(ref name) = request.name {
            let (first, middle, last, second_last) = split_name(name);
            (Some(first), middle, Some(last), second_last)
        } else {
            (None, None, None, None)
        };

    let id_premium = request
        .id_premium
        .or(request.is_premium.map(|is_premium| if is_premium != 0 { 2 } else { 1 }));

    let storage = UserStorage::new(&state.pool);
    storage
        .update_profile(
            user.auth_id,
            &UpdateUserProfile {
                primer_nombre,
                segundo_nombre,
                primer_apellido,
                segundo_apellido,
                id_premium,
            },
        )
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    let profile = storage
        .find_by_auth_id(user.auth_id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    tracing::info!(uid = %user.auth_id, "profile updated");

    Ok(Json(profile_response(profile)))
}

// =============================================================================
// Administration
// =============================================================================

/// GET /api/users - List all users (admin only).
pub async fn list(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<impl IntoResponse, ApiError> {
    let users = UserStorage::new(&state.pool)
        .list()
        .await
        .map_err(storage_error)?;

    Ok(Json(users))
}

#[derive(Debug, Deserialize)]
pub struct ChangeRoleRequest {
    pub role: Option<String>,
}

/// PUT /api/users/{id}/role - Change a user's role (admin only).
pub async fn change_role(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<Uuid>,
    Json(request): Json<ChangeRoleRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(role) = request.role else {
        return Err(ApiError::bad_request("Por favor especifique el rol"));
    };

    let role: UserRole = role
        .parse()
        .map_err(|_| ApiError::bad_request("Rol inválido"))?;

    let updated = UserStorage::new(&state.pool)
        .change_role(id, role.id())
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    tracing::info!(uid = %id, role = %role, "user role changed");

    Ok(Json(serde_json::json!({
        "uid": updated.id_autentificar,
        "name": format!("{} {}", updated.primer_nombre, updated.primer_apellido),
        "role": role.label(),
    })))
}

// =============================================================================
// Premium
// =============================================================================

/// GET /api/users/premium-types - Available premium tiers.
pub async fn premium_types(
    State(state): State<AppState>,
    _user: CurrentUser,
) -> Result<impl IntoResponse, ApiError> {
    let types = PremiumStorage::new(&state.pool)
        .list()
        .await
        .map_err(storage_error)?;

    Ok(Envelope::data(types))
}

#[derive(Debug, Deserialize)]
pub struct UpdatePremiumRequest {
    pub id_premium: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct PremiumResponse {
    pub success: bool,
    pub message: String,
    pub user: PremiumUser,
}

#[derive(Debug, Serialize)]
pub struct PremiumUser {
    pub uid: Uuid,
    pub id_premium: i32,
    pub is_premium: i32,
    pub premium_type: String,
}

/// PUT /api/users/premium - Change the caller's premium tier.
pub async fn update_premium(
    State(state): State<AppState>,
    user: CurrentUser,
    Json(request): Json<UpdatePremiumRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let Some(id_premium) = request.id_premium.filter(|id| [1, 2].contains(id)) else {
        return Err(ApiError::bad_request(
            "ID de premium inválido. Debe ser 1 (Free) o 2 (Premium)",
        ));
    };

    let storage = UserStorage::new(&state.pool);
    storage
        .set_premium(user.auth_id, id_premium)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    let profile = storage
        .find_by_auth_id(user.auth_id)
        .await
        .map_err(storage_error)?
        .ok_or_else(|| ApiError::not_found("Usuario no encontrado"))?;

    let premium_type = profile
        .premium_descripcion
        .unwrap_or_else(|| "Free".to_string());

    tracing::info!(uid = %user.auth_id, id_premium, "premium tier changed");

    Ok(Json(PremiumResponse {
        success: true,
        message: format!("Usuario actualizado a {premium_type} exitosamente"),
        user: PremiumUser {
            uid: user.auth_id,
            id_premium,
            is_premium: i32::from(id_premium == 2),
            premium_type,
        },
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn email_regex_accepts_plain_addresses() {
        assert!(EMAIL_RE.is_match("ana@example.com"));
        assert!(EMAIL_RE.is_match("a.b+c@sub.domain.org"));
        assert!(!EMAIL_RE.is_match("no-at-sign"));
        assert!(!EMAIL_RE.is_match("spaces in@example.com"));
        assert!(!EMAIL_RE.is_match("ana@nodot"));
    }

    #[test]
    fn split_name_components() {
        assert_eq!(
            split_name("Ana Rojas"),
            ("Ana".into(), None, "Rojas".into(), None)
        );
        assert_eq!(
            split_name("Ana María Rojas"),
            ("Ana".into(), Some("María".into()), "Rojas".into(), None)
        );
        assert_eq!(
            split_name("Ana María Rojas Díaz"),
            (
                "Ana".into(),
                Some("María".into()),
                "Rojas".into(),
                Some("Díaz".into())
            )
        );
    }
}
