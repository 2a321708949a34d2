//! Presign token issuer
//!
//! Mints short-lived upload authorizations. Batch creation (when no batch
//! id is supplied) and slot creation happen in one transaction: by the
//! time the caller sees an upload id, its slot row is durable. Re-presign
//! against an existing batch is additive; existing slots are never touched.

use std::collections::HashSet;

use chrono::{DateTime, Duration, Utc};
use recbatch_common::ids;
use sqlx::SqlitePool;

use crate::db::slots::SlotState;
use crate::error::{ApiError, ApiResult};
use crate::services::status::{derive_status, BatchStatus};

/// Most slots accepted in one presign call
pub const MAX_SLOTS_PER_CALL: usize = 10;

/// One requested slot: filename hint plus the content type that will be
/// authoritative for the eventual stored object
#[derive(Debug, Clone)]
pub struct SlotRequest {
    pub filename: String,
    pub content_type: String,
}

/// One minted slot
#[derive(Debug, Clone)]
pub struct IssuedSlot {
    pub upload_id: String,
    pub token: String,
    pub filename: String,
    pub content_type: String,
}

/// Result of a presign call
#[derive(Debug, Clone)]
pub struct PresignOutcome {
    pub batch_id: String,
    pub expires_at: DateTime<Utc>,
    pub expires_in_seconds: u64,
    pub slots: Vec<IssuedSlot>,
}

/// Presign token issuer
pub struct PresignIssuer {
    db: SqlitePool,
    ttl_seconds: u64,
}

impl PresignIssuer {
    pub fn new(db: SqlitePool, ttl_seconds: u64) -> Self {
        Self { db, ttl_seconds }
    }

    /// Issue presigned slots, creating a new batch when `batch_id` is
    /// absent. Fails with `UnknownBatch` for a missing batch and
    /// `BatchFinalized` for a complete one.
    pub async fn issue(
        &self,
        batch_id: Option<String>,
        requests: Vec<SlotRequest>,
    ) -> ApiResult<PresignOutcome> {
        if requests.is_empty() || requests.len() > MAX_SLOTS_PER_CALL {
            return Err(ApiError::BadRequest(format!(
                "items must contain between 1 and {} entries",
                MAX_SLOTS_PER_CALL
            )));
        }
        for req in &requests {
            if req.filename.trim().is_empty() || req.content_type.trim().is_empty() {
                return Err(ApiError::BadRequest(
                    "filename and contentType must be non-empty".to_string(),
                ));
            }
        }

        let now = Utc::now();
        let expires_at = now + Duration::seconds(self.ttl_seconds as i64);

        let mut tx = self.db.begin().await?;

        let (batch_id, created_batch) = match batch_id {
            Some(id) => {
                let exists: Option<(String,)> =
                    sqlx::query_as("SELECT id FROM batches WHERE id = ?")
                        .bind(&id)
                        .fetch_optional(&mut *tx)
                        .await?;
                if exists.is_none() {
                    return Err(ApiError::UnknownBatch(id));
                }

                // A complete batch is finalized; additions are rejected
                let slot_rows: Vec<(String, Option<String>)> =
                    sqlx::query_as("SELECT state, blob_ref FROM upload_slots WHERE batch_id = ?")
                        .bind(&id)
                        .fetch_all(&mut *tx)
                        .await?;
                let mut pairs = Vec::with_capacity(slot_rows.len());
                for (state, blob_ref) in slot_rows {
                    pairs.push((SlotState::parse(&state)?, blob_ref));
                }
                let recorded: Vec<(String,)> =
                    sqlx::query_as("SELECT DISTINCT blob_ref FROM recordings WHERE batch_id = ?")
                        .bind(&id)
                        .fetch_all(&mut *tx)
                        .await?;
                let recorded_refs: HashSet<String> = recorded.into_iter().map(|(r,)| r).collect();

                if derive_status(&pairs, &recorded_refs) == BatchStatus::Complete {
                    return Err(ApiError::BatchFinalized(id));
                }

                (id, false)
            }
            None => {
                let id = ids::new_batch_id();
                sqlx::query("INSERT INTO batches (id, created_at) VALUES (?, ?)")
                    .bind(&id)
                    .bind(now.to_rfc3339())
                    .execute(&mut *tx)
                    .await?;
                (id, true)
            }
        };

        let mut slots = Vec::with_capacity(requests.len());
        for req in requests {
            let upload_id = ids::new_upload_id();
            let token = ids::new_token();

            sqlx::query(
                r#"
                INSERT INTO upload_slots
                    (upload_id, batch_id, filename, content_type, token, state, expires_at, created_at)
                VALUES (?, ?, ?, ?, ?, 'pending', ?, ?)
                "#,
            )
            .bind(&upload_id)
            .bind(&batch_id)
            .bind(&req.filename)
            .bind(&req.content_type)
            .bind(&token)
            .bind(expires_at.to_rfc3339())
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;

            slots.push(IssuedSlot {
                upload_id,
                token,
                filename: req.filename,
                content_type: req.content_type,
            });
        }

        tx.commit().await?;

        tracing::info!(
            batch_id = %batch_id,
            created_batch,
            slot_count = slots.len(),
            "Issued presigned upload slots"
        );

        Ok(PresignOutcome {
            batch_id,
            expires_at,
            expires_in_seconds: self.ttl_seconds,
            slots,
        })
    }
}
