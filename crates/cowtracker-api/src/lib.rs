use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;

/// High-level API errors mapped to HTTP responses.
///
/// Taxonomy: `BadRequest` (malformed/missing input), `Unauthorized` (missing
/// or invalid credentials), `Forbidden` (role mismatch), `NotFound` (missing
/// farm/code/resource), `Conflict` (reserved for code-space exhaustion),
/// `NotImplemented`, `Internal` (datastore/backend failure).
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("Bad request: {0}")]
    BadRequest(String),
    #[error("Unauthorized: {0}")]
    Unauthorized(String),
    #[error("Forbidden: {0}")]
    Forbidden(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Not implemented: {0}")]
    NotImplemented(String),
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }
    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }
    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }
    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }
    pub fn not_implemented(msg: impl Into<String>) -> Self {
        Self::NotImplemented(msg.into())
    }
    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::NotImplemented(_) => StatusCode::NOT_IMPLEMENTED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// The human-readable message carried by this error.
    pub fn message(&self) -> &str {
        match self {
            ApiError::BadRequest(m)
            | ApiError::Unauthorized(m)
            | ApiError::Forbidden(m)
            | ApiError::NotFound(m)
            | ApiError::Conflict(m)
            | ApiError::NotImplemented(m)
            | ApiError::Internal(m) => m,
        }
    }
}

/// Error envelope serialized as `{"success": false, "message": ...}`.
#[derive(Debug, Clone, Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    message: &'a str,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let envelope = ErrorEnvelope {
            success: false,
            message: self.message(),
        };
        let body = serde_json::to_vec(&envelope)
            .unwrap_or_else(|_| b"{\"success\":false,\"message\":\"error\"}".to_vec());

        axum::http::Response::builder()
            .status(status)
            .header(
                header::CONTENT_TYPE,
                HeaderValue::from_static("application/json"),
            )
            .body(axum::body::Body::from(body))
            .unwrap_or_else(|_| {
                axum::http::Response::builder()
                    .status(StatusCode::INTERNAL_SERVER_ERROR)
                    .body(axum::body::Body::from("{}"))
                    .expect("build fallback response")
            })
    }
}

// -------------------------
// Success envelope
// -------------------------

/// Success envelope `{"success": true, "message"?: ..., "data"?: ...}`.
///
/// CRUD endpoints that historically returned bare rows keep doing so; this
/// envelope is for the endpoints that always wrapped their payload
/// (link codes, memberships, cache administration).
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> Envelope<T> {
    pub fn data(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn with_message(data: T, message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }
}

impl Envelope<()> {
    pub fn message_only(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
    fn into_response(self) -> Response {
        axum::Json(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::response::IntoResponse;

    #[test]
    fn into_response_sets_status_and_content_type() {
        let resp = ApiError::bad_request("Se requiere idFinca y tipo").into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let content_type = resp.headers().get(header::CONTENT_TYPE).unwrap();
        assert_eq!(content_type, &HeaderValue::from_static("application/json"));
    }

    #[test]
    fn api_error_variants_map_to_status() {
        let cases: Vec<(ApiError, StatusCode)> = vec![
            (ApiError::bad_request("x"), StatusCode::BAD_REQUEST),
            (ApiError::unauthorized("x"), StatusCode::UNAUTHORIZED),
            (ApiError::forbidden("x"), StatusCode::FORBIDDEN),
            (ApiError::not_found("x"), StatusCode::NOT_FOUND),
            (ApiError::conflict("x"), StatusCode::CONFLICT),
            (ApiError::not_implemented("x"), StatusCode::NOT_IMPLEMENTED),
            (ApiError::internal("x"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(err.status_code(), status);
        }
    }

    #[test]
    fn error_envelope_shape() {
        let err = ApiError::not_found("Código no encontrado");
        let envelope = ErrorEnvelope {
            success: false,
            message: err.message(),
        };
        let j = serde_json::to_value(&envelope).unwrap();
        assert_eq!(j["success"], false);
        assert_eq!(j["message"], "Código no encontrado");
    }

    #[test]
    fn success_envelope_skips_absent_fields() {
        let j = serde_json::to_value(Envelope::data(serde_json::json!({"codigo": "A1B2C3"})))
            .unwrap();
        assert_eq!(j["success"], true);
        assert!(j.get("message").is_none());
        assert_eq!(j["data"]["codigo"], "A1B2C3");

        let j = serde_json::to_value(Envelope::message_only("Código eliminado correctamente"))
            .unwrap();
        assert_eq!(j["success"], true);
        assert_eq!(j["message"], "Código eliminado correctamente");
        assert!(j.get("data").is_none());
    }
}
