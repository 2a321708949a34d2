//! Recording registration endpoint
//!
//! `POST /recordings` registers metadata against uploaded blobs. The
//! whole item list commits atomically; linkage failures abort the call.

use axum::extract::State;
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::auth::RequireApiKey;
use crate::error::ApiResult;
use crate::services::registrar::{RecordingInput, RecordingRegistrar};
use crate::services::status::BatchStatus;
use crate::AppState;

/// One recording to register
#[derive(Debug, Deserialize)]
pub struct RecordingItemIn {
    pub blob_ref: String,
    /// Opaque caller document, stored verbatim
    pub metadata: serde_json::Value,
}

/// Registration request body
#[derive(Debug, Deserialize)]
pub struct RecordingsRequest {
    pub batch_id: String,
    pub items: Vec<RecordingItemIn>,
}

#[derive(Debug, Serialize)]
pub struct RecordingItemOut {
    pub recording_id: String,
}

#[derive(Debug, Serialize)]
pub struct PollLink {
    pub href: String,
}

/// Registration response body
#[derive(Debug, Serialize)]
pub struct RecordingsResponse {
    pub batch_id: String,
    pub status: BatchStatus,
    pub items: Vec<RecordingItemOut>,
    pub poll: PollLink,
}

/// POST /recordings
pub async fn create_recordings(
    State(state): State<AppState>,
    _auth: RequireApiKey,
    Json(req): Json<RecordingsRequest>,
) -> ApiResult<Json<RecordingsResponse>> {
    let registrar = RecordingRegistrar::new(state.db.clone());

    let items = req
        .items
        .into_iter()
        .map(|item| RecordingInput {
            blob_ref: item.blob_ref,
            metadata: item.metadata,
        })
        .collect();

    let outcome = registrar.register(&req.batch_id, items).await?;

    Ok(Json(RecordingsResponse {
        poll: PollLink {
            href: format!("/batches/{}", outcome.batch_id),
        },
        batch_id: outcome.batch_id,
        status: outcome.status,
        items: outcome
            .recording_ids
            .into_iter()
            .map(|recording_id| RecordingItemOut { recording_id })
            .collect(),
    }))
}

/// Build recording routes
pub fn recording_routes() -> Router<AppState> {
    Router::new().route("/recordings", post(create_recordings))
}
