//! Batch status derivation and read-only projection
//!
//! Status is a pure function of slot and recording state, recomputed on
//! every read. Nothing on this path mutates the registry.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use recbatch_common::{Error, Result};
use serde::Serialize;
use sqlx::{Row, SqlitePool};

use crate::db::slots::SlotState;
use crate::db;
use crate::error::{ApiError, ApiResult};

/// Derived batch status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Open,
    PartiallyFulfilled,
    Complete,
}

impl BatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BatchStatus::Open => "open",
            BatchStatus::PartiallyFulfilled => "partially_fulfilled",
            BatchStatus::Complete => "complete",
        }
    }
}

/// Derive batch status from slot state and the set of blob refs that have
/// at least one recording.
///
/// - `complete`: every slot fulfilled and every fulfilled ref recorded
/// - `partially_fulfilled`: some slot fulfilled but not all, or a
///   fulfilled ref still lacks a recording
/// - `open`: everything else (including a batch with no slots yet)
pub fn derive_status(
    slots: &[(SlotState, Option<String>)],
    recorded_refs: &HashSet<String>,
) -> BatchStatus {
    if slots.is_empty() {
        return BatchStatus::Open;
    }

    let all_fulfilled = slots.iter().all(|(state, _)| *state == SlotState::Fulfilled);
    let any_fulfilled = slots.iter().any(|(state, _)| *state == SlotState::Fulfilled);
    let all_recorded = slots
        .iter()
        .filter(|(state, _)| *state == SlotState::Fulfilled)
        .all(|(_, blob_ref)| {
            blob_ref
                .as_deref()
                .map(|r| recorded_refs.contains(r))
                .unwrap_or(false)
        });

    if all_fulfilled && all_recorded {
        BatchStatus::Complete
    } else if any_fulfilled {
        BatchStatus::PartiallyFulfilled
    } else {
        BatchStatus::Open
    }
}

/// Recompute the status of one batch from the database
pub async fn batch_status(pool: &SqlitePool, batch_id: &str) -> Result<BatchStatus> {
    let slots = db::slots::slots_for_batch(pool, batch_id).await?;
    let pairs: Vec<(SlotState, Option<String>)> = slots
        .into_iter()
        .map(|s| (s.state, s.blob_ref))
        .collect();

    let recorded: Vec<(String,)> =
        sqlx::query_as("SELECT DISTINCT blob_ref FROM recordings WHERE batch_id = ?")
            .bind(batch_id)
            .fetch_all(pool)
            .await?;
    let recorded_refs: HashSet<String> = recorded.into_iter().map(|(r,)| r).collect();

    Ok(derive_status(&pairs, &recorded_refs))
}

/// One recording in a batch view, joined with its blob attributes
#[derive(Debug, Clone, Serialize)]
pub struct RecordingView {
    pub recording_id: String,
    pub blob_ref: String,
    pub content_type: Option<String>,
    pub byte_length: Option<i64>,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Read-only projection of one batch
#[derive(Debug, Clone, Serialize)]
pub struct BatchView {
    pub batch_id: String,
    pub status: BatchStatus,
    pub created_at: DateTime<Utc>,
    pub recordings: Vec<RecordingView>,
}

/// Batch status reader
pub struct BatchStatusReader {
    db: SqlitePool,
}

impl BatchStatusReader {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Project one batch: derived status plus its recordings
    pub async fn get_batch(&self, batch_id: &str) -> ApiResult<BatchView> {
        let batch = db::batches::get_batch(&self.db, batch_id)
            .await?
            .ok_or_else(|| ApiError::UnknownBatch(batch_id.to_string()))?;

        let status = batch_status(&self.db, batch_id).await?;
        let recordings = self.recordings_with_blobs(batch_id).await?;

        Ok(BatchView {
            batch_id: batch.id,
            status,
            created_at: batch.created_at,
            recordings,
        })
    }

    /// Project every batch, newest first
    pub async fn list_batches(&self) -> ApiResult<Vec<BatchView>> {
        let batches = db::batches::list_batches(&self.db).await?;
        let mut views = Vec::with_capacity(batches.len());
        for batch in batches {
            let status = batch_status(&self.db, &batch.id).await?;
            let recordings = self.recordings_with_blobs(&batch.id).await?;
            views.push(BatchView {
                batch_id: batch.id,
                status,
                created_at: batch.created_at,
                recordings,
            });
        }
        Ok(views)
    }

    async fn recordings_with_blobs(&self, batch_id: &str) -> ApiResult<Vec<RecordingView>> {
        let rows = sqlx::query(
            r#"
            SELECT r.id, r.blob_ref, r.metadata, r.created_at,
                   b.content_type, b.byte_length
            FROM recordings r
            LEFT JOIN blobs b ON b.blob_ref = r.blob_ref
            WHERE r.batch_id = ?
            ORDER BY r.rowid
            "#,
        )
        .bind(batch_id)
        .fetch_all(&self.db)
        .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in rows {
            let metadata_str: String = row.get("metadata");
            let metadata = serde_json::from_str(&metadata_str).map_err(|e| {
                Error::Internal(format!("Invalid metadata JSON in database: {}", e))
            })?;
            let created_at_str: String = row.get("created_at");
            let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))?
                .with_timezone(&Utc);

            views.push(RecordingView {
                recording_id: row.get("id"),
                blob_ref: row.get("blob_ref"),
                content_type: row.get("content_type"),
                byte_length: row.get("byte_length"),
                metadata,
                created_at,
            });
        }
        Ok(views)
    }
}
