//! HTTP request handlers, one module per resource.

pub mod cattle;
pub mod farms;
pub mod link_codes;
pub mod medications;
pub mod memberships;
pub mod sales;
pub mod system;
pub mod users;
pub mod vet_records;

use cowtracker_api::ApiError;
use cowtracker_storage::StorageError;

use crate::link_codes::LinkCodeError;

/// Map storage failures onto the API taxonomy.
pub(crate) fn storage_error(err: StorageError) -> ApiError {
    match err {
        StorageError::NotFound(msg) => ApiError::not_found(msg),
        StorageError::Conflict(msg) => ApiError::conflict(msg),
        StorageError::InvalidInput(msg) => ApiError::bad_request(msg),
        other => ApiError::internal(other.to_string()),
    }
}

impl From<LinkCodeError> for ApiError {
    fn from(err: LinkCodeError) -> Self {
        match err {
            LinkCodeError::InvalidArgument(msg) => ApiError::bad_request(msg),
            LinkCodeError::NotFound(msg) => ApiError::not_found(msg),
            LinkCodeError::Forbidden(msg) => ApiError::forbidden(msg),
            LinkCodeError::Conflict(msg) => ApiError::conflict(msg),
            LinkCodeError::Storage(err) => storage_error(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    #[test]
    fn storage_errors_map_to_taxonomy() {
        assert_eq!(
            storage_error(StorageError::not_found("x")).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            storage_error(StorageError::conflict("x")).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            storage_error(StorageError::invalid_input("x")).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            storage_error(StorageError::from(sqlx_core::Error::PoolClosed)).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn link_code_errors_map_to_taxonomy() {
        let cases = [
            (
                LinkCodeError::InvalidArgument("x".into()),
                StatusCode::BAD_REQUEST,
            ),
            (LinkCodeError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (LinkCodeError::Forbidden("x".into()), StatusCode::FORBIDDEN),
            (LinkCodeError::Conflict("x".into()), StatusCode::CONFLICT),
        ];
        for (err, status) in cases {
            let api: ApiError = err.into();
            assert_eq!(api.status_code(), status);
        }
    }
}
