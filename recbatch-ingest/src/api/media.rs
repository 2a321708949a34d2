//! Media streaming endpoint
//!
//! `GET /media/:recording_id` streams the stored bytes of a recording
//! with its declared content type. Browser-friendly: accepts the key as
//! a query parameter as well as the header.

use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, HeaderValue};
use axum::response::{IntoResponse, Response};
use axum::{routing::get, Router};
use serde::Deserialize;

use crate::api::auth;
use crate::db;
use crate::error::{ApiError, ApiResult};
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct MediaQuery {
    pub key: Option<String>,
}

/// GET /media/:recording_id
pub async fn stream_media(
    State(state): State<AppState>,
    Path(recording_id): Path<String>,
    Query(query): Query<MediaQuery>,
    headers: HeaderMap,
) -> ApiResult<Response> {
    let header_key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    auth::check_key(&state, header_key.or(query.key.as_deref()))?;

    let recording = db::recordings::load_recording(&state.db, &recording_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Recording not found: {}", recording_id)))?;
    let blob = db::blobs::load_blob(&state.db, &recording.blob_ref)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Blob not found: {}", recording.blob_ref)))?;

    let bytes = state.store.read(&recording.blob_ref).await.map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ApiError::NotFound("File missing on disk".to_string())
        } else {
            ApiError::StorageFailure(e.to_string())
        }
    })?;

    let content_type = HeaderValue::from_str(&blob.content_type)
        .unwrap_or_else(|_| HeaderValue::from_static("application/octet-stream"));

    let mut response = bytes.into_response();
    response.headers_mut().insert(header::CONTENT_TYPE, content_type);
    Ok(response)
}

/// Build media routes
pub fn media_routes() -> Router<AppState> {
    Router::new().route("/media/:recording_id", get(stream_media))
}
