//! Recording registrar
//!
//! Verifies batch/blob linkage and commits recordings. The whole item list
//! is one transaction: one bad item aborts the call with nothing written.

use recbatch_common::ids;
use sqlx::SqlitePool;

use crate::error::{ApiError, ApiResult};
use crate::services::status::{self, BatchStatus};

/// Most recordings accepted in one call
pub const MAX_ITEMS_PER_CALL: usize = 10;

/// One recording to register: a blob ref plus an opaque metadata document
#[derive(Debug, Clone)]
pub struct RecordingInput {
    pub blob_ref: String,
    pub metadata: serde_json::Value,
}

/// Result of a successful registration call
#[derive(Debug, Clone)]
pub struct RegisterOutcome {
    pub batch_id: String,
    pub status: BatchStatus,
    pub recording_ids: Vec<String>,
}

/// Recording registrar
pub struct RecordingRegistrar {
    db: SqlitePool,
}

impl RecordingRegistrar {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Register recordings against a batch.
    ///
    /// Every `blob_ref` must resolve to a slot fulfilled under the same
    /// batch: a ref fulfilled under a different batch is `BlobNotLinked`,
    /// a ref no slot carries is `BlobNotFound`. All items commit together
    /// or not at all.
    pub async fn register(
        &self,
        batch_id: &str,
        items: Vec<RecordingInput>,
    ) -> ApiResult<RegisterOutcome> {
        if items.is_empty() || items.len() > MAX_ITEMS_PER_CALL {
            return Err(ApiError::BadRequest(format!(
                "items must contain between 1 and {} entries",
                MAX_ITEMS_PER_CALL
            )));
        }

        let now = chrono::Utc::now();
        let mut tx = self.db.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM batches WHERE id = ?")
            .bind(batch_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(ApiError::UnknownBatch(batch_id.to_string()));
        }

        let mut recording_ids = Vec::with_capacity(items.len());
        for item in &items {
            // Linkage check: the ref must belong to a fulfilled slot of
            // this very batch
            let linked: Option<(String,)> = sqlx::query_as(
                "SELECT upload_id FROM upload_slots WHERE blob_ref = ? AND batch_id = ? AND state = 'fulfilled' LIMIT 1",
            )
            .bind(&item.blob_ref)
            .bind(batch_id)
            .fetch_optional(&mut *tx)
            .await?;

            if linked.is_none() {
                let elsewhere: Option<(String,)> = sqlx::query_as(
                    "SELECT upload_id FROM upload_slots WHERE blob_ref = ? LIMIT 1",
                )
                .bind(&item.blob_ref)
                .fetch_optional(&mut *tx)
                .await?;

                return Err(match elsewhere {
                    None => ApiError::BlobNotFound(item.blob_ref.clone()),
                    Some(_) => ApiError::BlobNotLinked {
                        blob_ref: item.blob_ref.clone(),
                        batch_id: batch_id.to_string(),
                    },
                });
            }

            let recording_id = ids::new_recording_id();
            let metadata_json = serde_json::to_string(&item.metadata).map_err(|e| {
                recbatch_common::Error::InvalidInput(format!("Unserializable metadata: {}", e))
            })?;

            sqlx::query(
                "INSERT INTO recordings (id, batch_id, blob_ref, metadata, created_at) VALUES (?, ?, ?, ?, ?)",
            )
            .bind(&recording_id)
            .bind(batch_id)
            .bind(&item.blob_ref)
            .bind(&metadata_json)
            .bind(now.to_rfc3339())
            .execute(&mut *tx)
            .await?;

            recording_ids.push(recording_id);
        }

        tx.commit().await?;

        let status = status::batch_status(&self.db, batch_id).await?;

        tracing::info!(
            batch_id = %batch_id,
            recording_count = recording_ids.len(),
            status = status.as_str(),
            "Registered recordings"
        );

        Ok(RegisterOutcome {
            batch_id: batch_id.to_string(),
            status,
            recording_ids,
        })
    }
}
