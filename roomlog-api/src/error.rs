//! Error types for roomlog-api
//!
//! Each failure kind carries a stable machine-readable code so clients
//! can distinguish retryable from terminal failures. The billing case
//! keeps its own code (`TRIAL_EXPIRED`) because clients key an upgrade
//! prompt off it.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

/// API error type
#[derive(Debug, Error)]
pub enum ApiError {
    /// No valid session (401)
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Subscription past due (402)
    #[error("Trial expired: {0}")]
    TrialExpired(String),

    /// Signed URL invalid or expired (403)
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Upload exceeds the configured size limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Object store rejected the operation (500)
    #[error("Storage error: {0}")]
    Storage(String),

    /// Row insert or lookup failure (500)
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Generic error
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<roomlog_common::Error> for ApiError {
    fn from(err: roomlog_common::Error) -> Self {
        use roomlog_common::Error;
        match err {
            Error::Unauthorized(msg) => ApiError::Unauthorized(msg),
            Error::BillingBlocked(msg) => ApiError::TrialExpired(msg),
            Error::NotFound(msg) => ApiError::NotFound(msg),
            Error::InvalidInput(msg) => ApiError::BadRequest(msg),
            Error::Storage(msg) => ApiError::Storage(msg),
            Error::Database(e) => ApiError::Persistence(e.to_string()),
            Error::Io(e) => ApiError::Io(e),
            Error::Config(msg) | Error::Internal(msg) => ApiError::Internal(msg),
        }
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        ApiError::Persistence(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", msg),
            ApiError::TrialExpired(msg) => (StatusCode::PAYMENT_REQUIRED, "TRIAL_EXPIRED", msg),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "FORBIDDEN", msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg),
            ApiError::PayloadTooLarge(msg) => {
                (StatusCode::PAYLOAD_TOO_LARGE, "PAYLOAD_TOO_LARGE", msg)
            }
            ApiError::Storage(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", msg),
            ApiError::Persistence(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "PERSISTENCE_ERROR", msg)
            }
            ApiError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", msg),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Other(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                err.to_string(),
            ),
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
