use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::repository::StorageError;

/// ApiError
///
/// The HTTP-facing failure taxonomy. Every handler returns this on the error path,
/// and the `IntoResponse` impl renders the uniform `{status: "error", error: ...}`
/// envelope the frontend expects.
///
/// 4xx variants carry the specific, client-safe message. 5xx variants carry no
/// detail: the underlying cause is logged at conversion time and the client only
/// sees a generic message.
#[derive(Debug, Error)]
pub enum ApiError {
    // 400: input failed validation before any storage call.
    #[error("{0}")]
    BadRequest(String),

    // 401: missing, expired, or unverifiable session token.
    #[error("{0}")]
    Unauthenticated(String),

    // 403: authenticated, but the role or ownership check failed.
    #[error("{0}")]
    Forbidden(String),

    // 404: the addressed resource does not exist.
    #[error("{0}")]
    NotFound(String),

    // 409: uniqueness constraint would be violated (duplicate email).
    #[error("{0}")]
    Conflict(String),

    // 503: the database is unreachable (pool exhausted, connection refused).
    #[error("service temporarily unavailable")]
    StorageUnavailable,

    // 500: anything else. Cause is logged, never returned.
    #[error("internal server error")]
    Internal,
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::StorageUnavailable => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Client-safe message for the envelope. 5xx variants deliberately return
    /// a generic string regardless of the underlying cause.
    pub fn message(&self) -> String {
        match self {
            ApiError::StorageUnavailable => "Service temporarily unavailable".to_string(),
            ApiError::Internal => "Internal Server Error".to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "status": "error",
            "error": self.message(),
        }));
        (status, body).into_response()
    }
}

/// Maps data-layer failures onto the HTTP taxonomy. Raw causes for the 5xx
/// variants are logged here, once, so handlers never have to.
impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::DuplicateEmail => {
                ApiError::Conflict("Email already registered".to_string())
            }
            StorageError::OutOfRange => {
                ApiError::BadRequest("Rating must be between 1 and 5".to_string())
            }
            StorageError::InvalidSort => ApiError::BadRequest("Invalid sort key".to_string()),
            StorageError::Unavailable(source) => {
                tracing::error!(error = %source, "database unavailable");
                ApiError::StorageUnavailable
            }
            StorageError::Query(source) => {
                tracing::error!(error = %source, "query failed");
                ApiError::Internal
            }
        }
    }
}
