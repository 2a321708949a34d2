//! Presign endpoint
//!
//! `POST /uploads/presign` issues presigned PUT targets, optionally
//! appending slots to an existing batch.

use std::collections::HashMap;

use axum::extract::{Host, State};
use axum::{routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::auth::RequireApiKey;
use crate::error::ApiResult;
use crate::services::presign::{PresignIssuer, SlotRequest};
use crate::AppState;

/// One requested upload in a presign call
#[derive(Debug, Deserialize)]
pub struct PresignItemIn {
    pub filename: String,
    #[serde(rename = "contentType")]
    pub content_type: String,
}

/// Presign request body
#[derive(Debug, Deserialize)]
pub struct PresignRequest {
    /// Existing batch to add uploads to; a new batch is created when absent
    pub batch_id: Option<String>,
    pub items: Vec<PresignItemIn>,
}

/// One minted upload target
#[derive(Debug, Serialize)]
pub struct PresignedItemOut {
    pub upload_id: String,
    pub method: String,
    /// PUT target embedding the upload id and its single-use token
    pub upload_url: String,
    pub required_headers: HashMap<String, String>,
}

/// Presign response body
#[derive(Debug, Serialize)]
pub struct PresignResponse {
    pub batch_id: String,
    pub expires_in_seconds: u64,
    pub items: Vec<PresignedItemOut>,
}

/// POST /uploads/presign
pub async fn presign_uploads(
    State(state): State<AppState>,
    _auth: RequireApiKey,
    Host(host): Host,
    Json(req): Json<PresignRequest>,
) -> ApiResult<Json<PresignResponse>> {
    let issuer = PresignIssuer::new(state.db.clone(), state.config.presign_ttl_seconds);

    let requests = req
        .items
        .into_iter()
        .map(|item| SlotRequest {
            filename: item.filename,
            content_type: item.content_type,
        })
        .collect();

    let outcome = issuer.issue(req.batch_id, requests).await?;

    let items = outcome
        .slots
        .iter()
        .map(|slot| PresignedItemOut {
            upload_id: slot.upload_id.clone(),
            method: "PUT".to_string(),
            upload_url: format!(
                "http://{}/uploads/{}?token={}",
                host, slot.upload_id, slot.token
            ),
            required_headers: HashMap::from([(
                "Content-Type".to_string(),
                slot.content_type.clone(),
            )]),
        })
        .collect();

    Ok(Json(PresignResponse {
        batch_id: outcome.batch_id,
        expires_in_seconds: outcome.expires_in_seconds,
        items,
    }))
}

/// Build presign routes
pub fn presign_routes() -> Router<AppState> {
    Router::new().route("/uploads/presign", post(presign_uploads))
}
