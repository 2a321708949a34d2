//! Error types for recbatch-ingest
//!
//! One variant per caller-visible failure kind. Every variant maps to a
//! stable `code` string in the JSON error body so clients can branch on
//! kind rather than parse messages.

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
    /// Referenced batch id does not exist (404)
    #[error("Unknown batch: {0}")]
    UnknownBatch(String),

    /// Batch is complete; no further presign calls accepted (409)
    #[error("Batch {0} is finalized and not open for new uploads")]
    BatchFinalized(String),

    /// Upload token does not match the slot, or the slot is unknown (400)
    #[error("Invalid upload token")]
    InvalidToken,

    /// Upload attempted after the token validity window (410)
    #[error("Upload token expired")]
    TokenExpired,

    /// Upload attempted against an already-completed slot (409)
    #[error("Upload slot already fulfilled")]
    AlreadyFulfilled,

    /// Declared vs. presented content type disagreement (400)
    #[error("Content-Type must be {expected} (got {actual})")]
    ContentTypeMismatch { expected: String, actual: String },

    /// Recording references a blob ref with no backing slot (409)
    #[error("Blob not found: {0}")]
    BlobNotFound(String),

    /// Recording references a blob fulfilled under a different batch (409)
    #[error("Blob {blob_ref} is not linked to batch {batch_id}")]
    BlobNotLinked { blob_ref: String, batch_id: String },

    /// Underlying blob persistence failed (500)
    #[error("Storage failure: {0}")]
    StorageFailure(String),

    /// Missing or invalid shared API key (401)
    #[error("Missing or invalid API key")]
    Unauthorized,

    /// Resource not found (404)
    #[error("Resource not found: {0}")]
    NotFound(String),

    /// Invalid request (400)
    #[error("Invalid request: {0}")]
    BadRequest(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// recbatch-common error
    #[error("Common error: {0}")]
    Common(#[from] recbatch_common::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match self {
            ApiError::UnknownBatch(_) => {
                (StatusCode::NOT_FOUND, "UNKNOWN_BATCH", self.to_string())
            }
            ApiError::BatchFinalized(_) => {
                (StatusCode::CONFLICT, "BATCH_FINALIZED", self.to_string())
            }
            ApiError::InvalidToken => {
                (StatusCode::BAD_REQUEST, "INVALID_TOKEN", self.to_string())
            }
            ApiError::TokenExpired => (StatusCode::GONE, "TOKEN_EXPIRED", self.to_string()),
            ApiError::AlreadyFulfilled => {
                (StatusCode::CONFLICT, "ALREADY_FULFILLED", self.to_string())
            }
            ApiError::ContentTypeMismatch { .. } => (
                StatusCode::BAD_REQUEST,
                "CONTENT_TYPE_MISMATCH",
                self.to_string(),
            ),
            ApiError::BlobNotFound(_) => {
                (StatusCode::CONFLICT, "BLOB_NOT_FOUND", self.to_string())
            }
            ApiError::BlobNotLinked { .. } => {
                (StatusCode::CONFLICT, "BLOB_NOT_LINKED", self.to_string())
            }
            ApiError::StorageFailure(ref msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "STORAGE_FAILURE",
                msg.clone(),
            ),
            ApiError::Unauthorized => {
                (StatusCode::UNAUTHORIZED, "UNAUTHORIZED", self.to_string())
            }
            ApiError::NotFound(ref msg) => (StatusCode::NOT_FOUND, "NOT_FOUND", msg.clone()),
            ApiError::BadRequest(ref msg) => {
                (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone())
            }
            ApiError::Database(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "DATABASE_ERROR",
                err.to_string(),
            ),
            ApiError::Io(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "IO_ERROR",
                err.to_string(),
            ),
            ApiError::Common(ref err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "COMMON_ERROR",
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
