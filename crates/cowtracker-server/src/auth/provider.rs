//! Identity provider client.
//!
//! The provider is an external HTTP service (Supabase auth). It owns
//! credentials and token issuance; this client only calls its REST surface:
//! token verification, signup, password sign-in, and refresh.

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

/// Errors from the identity provider.
#[derive(Debug, Error)]
pub enum AuthProviderError {
    #[error("Token inválido o expirado")]
    InvalidToken,
    #[error("Credenciales incorrectas. Por favor, verifica tu email y contraseña.")]
    InvalidCredentials,
    #[error("Identity provider error: {0}")]
    Upstream(String),
}

/// The provider's view of an authenticated account.
#[derive(Debug, Clone)]
pub struct AuthIdentity {
    pub id: Uuid,
    pub email: Option<String>,
}

/// A session returned by signup/sign-in/refresh.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: AuthIdentity,
    /// Absent when the provider defers the session (e.g. pending email
    /// confirmation on signup).
    pub access_token: Option<String>,
    pub refresh_token: Option<String>,
}

/// External identity provider interface.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Validate a bearer token and return the account it belongs to.
    async fn verify_token(&self, token: &str) -> Result<AuthIdentity, AuthProviderError>;

    /// Create an account.
    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError>;

    /// Password sign-in.
    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError>;

    /// Exchange a refresh token for a new session.
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthProviderError>;
}

// =============================================================================
// Supabase client
// =============================================================================

/// HTTP client for the Supabase auth API (`/auth/v1/*`).
#[derive(Clone)]
pub struct SupabaseAuthClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: Uuid,
    email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SessionPayload {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<UserPayload>,
}

impl From<UserPayload> for AuthIdentity {
    fn from(user: UserPayload) -> Self {
        Self {
            id: user.id,
            email: user.email,
        }
    }
}

impl SupabaseAuthClient {
    pub fn new(base_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/auth/v1/{path}", self.base_url)
    }

    fn session_from(&self, payload: SessionPayload) -> Result<AuthSession, AuthProviderError> {
        let user = payload
            .user
            .ok_or_else(|| AuthProviderError::Upstream("session without user".into()))?;
        Ok(AuthSession {
            user: user.into(),
            access_token: payload.access_token,
            refresh_token: payload.refresh_token,
        })
    }
}

#[async_trait]
impl IdentityProvider for SupabaseAuthClient {
    async fn verify_token(&self, token: &str) -> Result<AuthIdentity, AuthProviderError> {
        let response = self
            .http
            .get(self.endpoint("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
            .send()
            .await
            .map_err(|e| AuthProviderError::Upstream(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let user: UserPayload = response
                    .json()
                    .await
                    .map_err(|e| AuthProviderError::Upstream(e.to_string()))?;
                Ok(user.into())
            }
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN => {
                Err(AuthProviderError::InvalidToken)
            }
            status => Err(AuthProviderError::Upstream(format!(
                "unexpected status {status}"
            ))),
        }
    }

    async fn sign_up(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError> {
        let response = self
            .http
            .post(self.endpoint("signup"))
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthProviderError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            tracing::warn!(%status, body = %body, "signup rejected by identity provider");
            return Err(AuthProviderError::Upstream(format!(
                "signup failed with status {status}"
            )));
        }

        // Signup may return a full session or just the user (confirmation
        // pending); both shapes carry the user object.
        let payload: SessionPayload = response
            .json()
            .await
            .map_err(|e| AuthProviderError::Upstream(e.to_string()))?;
        self.session_from(payload)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<AuthSession, AuthProviderError> {
        let url = format!("{}?grant_type=password", self.endpoint("token"));
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "email": email, "password": password }))
            .send()
            .await
            .map_err(|e| AuthProviderError::Upstream(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let payload: SessionPayload = response
                    .json()
                    .await
                    .map_err(|e| AuthProviderError::Upstream(e.to_string()))?;
                self.session_from(payload)
            }
            reqwest::StatusCode::BAD_REQUEST | reqwest::StatusCode::UNAUTHORIZED => {
                Err(AuthProviderError::InvalidCredentials)
            }
            status => Err(AuthProviderError::Upstream(format!(
                "unexpected status {status}"
            ))),
        }
    }

    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, AuthProviderError> {
        let url = format!("{}?grant_type=refresh_token", self.endpoint("token"));
        let response = self
            .http
            .post(url)
            .header("apikey", &self.anon_key)
            .json(&json!({ "refresh_token": refresh_token }))
            .send()
            .await
            .map_err(|e| AuthProviderError::Upstream(e.to_string()))?;

        match response.status() {
            status if status.is_success() => {
                let payload: SessionPayload = response
                    .json()
                    .await
                    .map_err(|e| AuthProviderError::Upstream(e.to_string()))?;
                self.session_from(payload)
            }
            reqwest::StatusCode::BAD_REQUEST | reqwest::StatusCode::UNAUTHORIZED => {
                Err(AuthProviderError::InvalidToken)
            }
            status => Err(AuthProviderError::Upstream(format!(
                "unexpected status {status}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const USER_ID: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

    #[tokio::test]
    async fn verify_token_returns_identity() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .and(header("authorization", "Bearer tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": USER_ID,
                "email": "ana@example.com"
            })))
            .mount(&server)
            .await;

        let client = SupabaseAuthClient::new(server.uri(), "anon");
        let identity = client.verify_token("tok-123").await.unwrap();
        assert_eq!(identity.id.to_string(), USER_ID);
        assert_eq!(identity.email.as_deref(), Some("ana@example.com"));
    }

    #[tokio::test]
    async fn verify_token_maps_401_to_invalid_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = SupabaseAuthClient::new(server.uri(), "anon");
        let err = client.verify_token("bad").await.unwrap_err();
        assert!(matches!(err, AuthProviderError::InvalidToken));
    }

    #[tokio::test]
    async fn sign_in_parses_session() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .and(query_param("grant_type", "password"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "jwt",
                "refresh_token": "refresh",
                "user": { "id": USER_ID, "email": "ana@example.com" }
            })))
            .mount(&server)
            .await;

        let client = SupabaseAuthClient::new(server.uri(), "anon");
        let session = client.sign_in("ana@example.com", "secret1").await.unwrap();
        assert_eq!(session.access_token.as_deref(), Some("jwt"));
        assert_eq!(session.user.id.to_string(), USER_ID);
    }

    #[tokio::test]
    async fn sign_in_maps_400_to_invalid_credentials() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/v1/token"))
            .respond_with(ResponseTemplate::new(400))
            .mount(&server)
            .await;

        let client = SupabaseAuthClient::new(server.uri(), "anon");
        let err = client.sign_in("ana@example.com", "wrong").await.unwrap_err();
        assert!(matches!(err, AuthProviderError::InvalidCredentials));
    }
}
