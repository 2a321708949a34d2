//! Upload sink endpoint
//!
//! `PUT /uploads/:upload_id?token=...` accepts raw bytes against a
//! presigned slot. Possession of the token is the sole authorization;
//! the shared API key is not required here.

use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::{routing::put, Json, Router};
use serde::{Deserialize, Serialize};

use crate::error::{ApiError, ApiResult};
use crate::services::upload::UploadReceiver;
use crate::AppState;

/// Uploads up to 100 MiB; the axum default of 2 MiB is too small for
/// audio files
const UPLOAD_BODY_LIMIT: usize = 100 * 1024 * 1024;

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub token: Option<String>,
}

/// Upload acknowledgement
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    /// Content-derived ref for the stored bytes
    pub blob_ref: String,
    pub byte_length: i64,
}

/// PUT /uploads/:upload_id
pub async fn receive_upload(
    State(state): State<AppState>,
    Path(upload_id): Path<String>,
    Query(query): Query<UploadQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<UploadResponse>)> {
    let token = query.token.ok_or(ApiError::InvalidToken)?;
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("");

    let receiver = UploadReceiver::new(state.db.clone(), state.store.clone());
    let outcome = match receiver.receive(&upload_id, &token, content_type, &body).await {
        Ok(outcome) => outcome,
        Err(e) => {
            if matches!(e, ApiError::StorageFailure(_)) {
                *state.last_error.write().await = Some(e.to_string());
            }
            return Err(e);
        }
    };

    Ok((
        StatusCode::CREATED,
        Json(UploadResponse {
            blob_ref: outcome.blob_ref,
            byte_length: outcome.byte_length,
        }),
    ))
}

/// Build upload sink routes
pub fn upload_routes() -> Router<AppState> {
    Router::new()
        .route("/uploads/:upload_id", put(receive_upload))
        .layer(DefaultBodyLimit::max(UPLOAD_BODY_LIMIT))
}
