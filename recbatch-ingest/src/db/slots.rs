//! Upload slot record operations
//!
//! A slot is a reservation for exactly one upload, bound to a token and a
//! batch. Its state machine is `pending -> fulfilled` or
//! `pending -> expired`, nothing else; both transitions are performed as a
//! conditional UPDATE so that concurrent callers cannot both win.

use chrono::{DateTime, Utc};
use recbatch_common::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Slot lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Pending,
    Fulfilled,
    Expired,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            SlotState::Pending => "pending",
            SlotState::Fulfilled => "fulfilled",
            SlotState::Expired => "expired",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(SlotState::Pending),
            "fulfilled" => Ok(SlotState::Fulfilled),
            "expired" => Ok(SlotState::Expired),
            other => Err(Error::Internal(format!("Invalid slot state in database: {}", other))),
        }
    }
}

/// Upload slot record
#[derive(Debug, Clone)]
pub struct UploadSlot {
    pub upload_id: String,
    pub batch_id: String,
    pub filename: Option<String>,
    pub content_type: String,
    pub token: String,
    pub state: SlotState,
    pub blob_ref: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

const SLOT_COLUMNS: &str =
    "upload_id, batch_id, filename, content_type, token, state, blob_ref, expires_at, created_at";

/// Load a slot by upload id
pub async fn load_slot(pool: &SqlitePool, upload_id: &str) -> Result<Option<UploadSlot>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM upload_slots WHERE upload_id = ?",
        SLOT_COLUMNS
    ))
    .bind(upload_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(map_slot_row(&row)?)),
        None => Ok(None),
    }
}

/// Load all slots belonging to a batch, oldest first
pub async fn slots_for_batch(pool: &SqlitePool, batch_id: &str) -> Result<Vec<UploadSlot>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM upload_slots WHERE batch_id = ? ORDER BY rowid",
        SLOT_COLUMNS
    ))
    .bind(batch_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_slot_row).collect()
}

/// Find a fulfilled slot carrying this blob ref inside the given batch.
/// Identical bytes may fulfill several slots; any one of them proves
/// linkage.
pub async fn fulfilled_slot_in_batch(
    pool: &SqlitePool,
    blob_ref: &str,
    batch_id: &str,
) -> Result<Option<UploadSlot>> {
    let row = sqlx::query(&format!(
        "SELECT {} FROM upload_slots WHERE blob_ref = ? AND batch_id = ? AND state = 'fulfilled' LIMIT 1",
        SLOT_COLUMNS
    ))
    .bind(blob_ref)
    .bind(batch_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(map_slot_row(&row)?)),
        None => Ok(None),
    }
}

/// True if any slot anywhere carries this blob ref
pub async fn any_slot_with_ref(pool: &SqlitePool, blob_ref: &str) -> Result<bool> {
    let row: Option<(String,)> =
        sqlx::query_as("SELECT upload_id FROM upload_slots WHERE blob_ref = ? LIMIT 1")
            .bind(blob_ref)
            .fetch_optional(pool)
            .await?;
    Ok(row.is_some())
}

/// Atomically transition a pending slot to fulfilled, recording the blob
/// ref. Returns false if the slot was not pending (lost the race or
/// already terminal).
pub async fn fulfill_slot(pool: &SqlitePool, upload_id: &str, blob_ref: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE upload_slots SET state = 'fulfilled', blob_ref = ? WHERE upload_id = ? AND state = 'pending'",
    )
    .bind(blob_ref)
    .bind(upload_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Atomically transition a pending slot to expired. Returns false if the
/// slot was not pending.
pub async fn expire_slot(pool: &SqlitePool, upload_id: &str) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE upload_slots SET state = 'expired' WHERE upload_id = ? AND state = 'pending'",
    )
    .bind(upload_id)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() == 1)
}

/// Expire every pending slot whose token lapsed before `now`. Used by the
/// periodic reaper; returns the number of slots transitioned.
pub async fn expire_stale_slots(pool: &SqlitePool, now: DateTime<Utc>) -> Result<u64> {
    let result = sqlx::query(
        "UPDATE upload_slots SET state = 'expired' WHERE state = 'pending' AND expires_at < ?",
    )
    .bind(now.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(result.rows_affected())
}

pub(crate) fn map_slot_row(row: &sqlx::sqlite::SqliteRow) -> Result<UploadSlot> {
    let state_str: String = row.get("state");
    let expires_at_str: String = row.get("expires_at");
    let created_at_str: String = row.get("created_at");

    let parse_ts = |s: &str| -> Result<DateTime<Utc>> {
        Ok(DateTime::parse_from_rfc3339(s)
            .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))?
            .with_timezone(&Utc))
    };

    Ok(UploadSlot {
        upload_id: row.get("upload_id"),
        batch_id: row.get("batch_id"),
        filename: row.get("filename"),
        content_type: row.get("content_type"),
        token: row.get("token"),
        state: SlotState::parse(&state_str)?,
        blob_ref: row.get("blob_ref"),
        expires_at: parse_ts(&expires_at_str)?,
        created_at: parse_ts(&created_at_str)?,
    })
}
