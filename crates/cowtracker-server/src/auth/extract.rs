//! Bearer-token extractors and the authentication middleware.

use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts};
use axum::http::{HeaderMap, header::AUTHORIZATION, request::Parts};
use uuid::Uuid;

use cowtracker_api::ApiError;
use cowtracker_core::UserRole;
use cowtracker_storage::{PgPool, UserStorage};

use super::provider::{AuthProviderError, IdentityProvider};

// =============================================================================
// Auth State
// =============================================================================

/// State required for bearer-token authentication.
///
/// Include it in the application state and expose it to the extractors via
/// `FromRef`.
#[derive(Clone)]
pub struct AuthState {
    /// Identity provider for token validation.
    pub provider: Arc<dyn IdentityProvider>,

    /// Connection pool for loading the caller's `usuario` row.
    pub pool: Arc<PgPool>,
}

impl AuthState {
    pub fn new(provider: Arc<dyn IdentityProvider>, pool: Arc<PgPool>) -> Self {
        Self { provider, pool }
    }
}

// =============================================================================
// Current User
// =============================================================================

/// The resolved caller: provider identity plus the matching `usuario` row.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    /// Identity-provider account id (`id_autentificar`).
    pub auth_id: Uuid,
    /// Numeric user id (`usuario.id_usuario`).
    pub user_id: i64,
    pub email: Option<String>,
    pub role: UserRole,
    pub role_id: i32,
    pub id_premium: i32,
}

fn bearer_token(headers: &HeaderMap) -> Result<&str, ApiError> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            ApiError::unauthorized(
                "Acceso no autorizado. Se requiere un token de autenticación.",
            )
        })?;

    header
        .strip_prefix("Bearer ")
        .filter(|token| !token.is_empty())
        .ok_or_else(|| {
            ApiError::unauthorized(
                "Acceso no autorizado. Se requiere un token de autenticación.",
            )
        })
}

impl From<AuthProviderError> for ApiError {
    fn from(err: AuthProviderError) -> Self {
        match err {
            AuthProviderError::InvalidToken | AuthProviderError::InvalidCredentials => {
                ApiError::unauthorized(err.to_string())
            }
            AuthProviderError::Upstream(_) => ApiError::internal(err.to_string()),
        }
    }
}

/// Resolve the caller from request headers: verify the token with the
/// provider, then load the matching `usuario` row with its role.
pub async fn resolve_current_user(
    state: &AuthState,
    headers: &HeaderMap,
) -> Result<CurrentUser, ApiError> {
    let token = bearer_token(headers)?;

    let identity = state.provider.verify_token(token).await?;

    let storage = UserStorage::new(&state.pool);
    let profile = storage
        .find_by_auth_id(identity.id)
        .await
        .map_err(|e| ApiError::internal(e.to_string()))?
        .ok_or_else(|| {
            ApiError::internal("Error al verificar la identidad del usuario.")
        })?;

    let role = UserRole::from_id(profile.user.id_rol);
    Ok(CurrentUser {
        auth_id: identity.id,
        user_id: profile.user.id_usuario,
        email: profile.correo.or(identity.email),
        role,
        role_id: profile.user.id_rol,
        id_premium: profile.user.id_premium,
    })
}

impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        // Fast path: the read-through cache layer already resolved the caller.
        if let Some(user) = parts.extensions.get::<CurrentUser>() {
            return Ok(user.clone());
        }

        let auth_state = AuthState::from_ref(state);
        resolve_current_user(&auth_state, &parts.headers).await
    }
}

/// Extractor requiring the admin role.
pub struct AdminUser(pub CurrentUser);

impl<S> FromRequestParts<S> for AdminUser
where
    S: Send + Sync,
    AuthState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let user = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(ApiError::forbidden(
                "Acceso denegado. Se requiere rol de admin.",
            ));
        }
        Ok(AdminUser(user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn bearer_token_requires_scheme() {
        let mut headers = HeaderMap::new();
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic abc"));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(bearer_token(&headers).is_err());

        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer tok-1"));
        assert_eq!(bearer_token(&headers).unwrap(), "tok-1");
    }

    #[test]
    fn provider_errors_map_to_api_errors() {
        let err: ApiError = AuthProviderError::InvalidToken.into();
        assert_eq!(err.status_code(), axum::http::StatusCode::UNAUTHORIZED);

        let err: ApiError = AuthProviderError::Upstream("boom".into()).into();
        assert_eq!(
            err.status_code(),
            axum::http::StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
