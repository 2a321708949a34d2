//! Batch endpoints
//!
//! `GET /batches/:id` polls one batch with its derived status,
//! `GET /batches` lists every batch for the UI, and
//! `DELETE /batches/:id` removes a batch with its recordings and any
//! stored blobs nothing else references.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::{routing::get, Json, Router};

use crate::api::auth::RequireApiKey;
use crate::error::ApiResult;
use crate::services::deleter::BatchDeleter;
use crate::services::status::{BatchStatusReader, BatchView};
use crate::AppState;

/// GET /batches/:batch_id
pub async fn get_batch(
    State(state): State<AppState>,
    _auth: RequireApiKey,
    Path(batch_id): Path<String>,
) -> ApiResult<Json<BatchView>> {
    let reader = BatchStatusReader::new(state.db.clone());
    Ok(Json(reader.get_batch(&batch_id).await?))
}

/// GET /batches
pub async fn list_batches(
    State(state): State<AppState>,
    _auth: RequireApiKey,
) -> ApiResult<Json<Vec<BatchView>>> {
    let reader = BatchStatusReader::new(state.db.clone());
    Ok(Json(reader.list_batches().await?))
}

/// DELETE /batches/:batch_id
pub async fn delete_batch(
    State(state): State<AppState>,
    _auth: RequireApiKey,
    Path(batch_id): Path<String>,
) -> ApiResult<StatusCode> {
    let deleter = BatchDeleter::new(state.db.clone(), state.store.clone());
    deleter.delete(&batch_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Build batch routes
pub fn batch_routes() -> Router<AppState> {
    Router::new()
        .route("/batches", get(list_batches))
        .route("/batches/:batch_id", get(get_batch).delete(delete_batch))
}
