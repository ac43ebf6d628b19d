//! Error types for prism-mi
//!
//! Every error body has `ok: false` and a snake_case `error` code the
//! dashboard can switch on. Details are passed through verbatim; this is an
//! internal operations tool.

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
    /// Request body failed the payload schema (400)
    #[error("Request validation failed: {}", .0.join("; "))]
    ValidationFailed(Vec<String>),

    /// Request body over the configured limit (413)
    #[error("Payload too large: {0}")]
    PayloadTooLarge(String),

    /// Snapshot store could not be read (500)
    #[error("Failed to read snapshot: {0}")]
    ReadFailed(String),

    /// Snapshot store could not be written (500)
    #[error("Failed to persist snapshot: {0}")]
    PersistFailed(String),

    /// Store content changed between load and write (409)
    #[error("Snapshot changed during import: {0}")]
    StaleSnapshot(String),

    /// Import exceeded its deadline; nothing was written (504)
    #[error("Import exceeded its {0} ms deadline")]
    ImportTimeout(u64),

    /// Internal server error (500)
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl ApiError {
    /// Wire error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::ValidationFailed(_) => "validation_failed",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::ReadFailed(_) => "read_failed",
            ApiError::PersistFailed(_) => "persist_failed",
            ApiError::StaleSnapshot(_) => "stale_snapshot",
            ApiError::ImportTimeout(_) => "import_timeout",
            ApiError::Internal(_) => "internal_error",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::ValidationFailed(_) => StatusCode::BAD_REQUEST,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::StaleSnapshot(_) => StatusCode::CONFLICT,
            ApiError::ImportTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
            ApiError::ReadFailed(_) | ApiError::PersistFailed(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = match &self {
            ApiError::ValidationFailed(details) => json!({
                "ok": false,
                "error": self.code(),
                "details": details,
            }),
            _ => json!({
                "ok": false,
                "error": self.code(),
                "message": self.to_string(),
            }),
        };

        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers
pub type ApiResult<T> = Result<T, ApiError>;
