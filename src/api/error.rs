use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use tracing::error;

use crate::service::ServiceError;

use super::response::ErrorResponse;

/// Errors surfaced at the REST boundary.
#[derive(Debug)]
pub enum ApiError {
    /// Malformed request body, rejected before reaching the core.
    Validation(String),
    Service(ServiceError),
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        ApiError::Service(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::Validation(message) => (StatusCode::BAD_REQUEST, message),
            ApiError::Service(ServiceError::Conflict) => (
                StatusCode::CONFLICT,
                ServiceError::Conflict.to_string(),
            ),
            ApiError::Service(ServiceError::NotFound) => (
                StatusCode::NOT_FOUND,
                ServiceError::NotFound.to_string(),
            ),
            ApiError::Service(ServiceError::Database(e)) => {
                error!(error = %e, "Database error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorResponse { error: message })).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        let cases = [
            (
                ApiError::Validation("bad".to_string()),
                StatusCode::BAD_REQUEST,
            ),
            (
                ApiError::Service(ServiceError::Conflict),
                StatusCode::CONFLICT,
            ),
            (
                ApiError::Service(ServiceError::NotFound),
                StatusCode::NOT_FOUND,
            ),
            (
                ApiError::Service(ServiceError::Database(sqlx::Error::PoolClosed)),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (err, expected) in cases {
            assert_eq!(err.into_response().status(), expected);
        }
    }
}
