//! Recording record operations
//!
//! Recordings are created only by the registrar, inside one transaction
//! per call, and are immutable thereafter. The metadata document is stored
//! verbatim as JSON text and never interpreted.

use chrono::{DateTime, Utc};
use recbatch_common::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Recording record
#[derive(Debug, Clone)]
pub struct Recording {
    pub id: String,
    pub batch_id: String,
    pub blob_ref: String,
    pub metadata: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

/// Load one recording by id
pub async fn load_recording(pool: &SqlitePool, recording_id: &str) -> Result<Option<Recording>> {
    let row = sqlx::query(
        "SELECT id, batch_id, blob_ref, metadata, created_at FROM recordings WHERE id = ?",
    )
    .bind(recording_id)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => Ok(Some(map_recording_row(&row)?)),
        None => Ok(None),
    }
}

/// Load all recordings belonging to a batch, oldest first
pub async fn recordings_for_batch(pool: &SqlitePool, batch_id: &str) -> Result<Vec<Recording>> {
    let rows = sqlx::query(
        "SELECT id, batch_id, blob_ref, metadata, created_at FROM recordings WHERE batch_id = ? ORDER BY rowid",
    )
    .bind(batch_id)
    .fetch_all(pool)
    .await?;

    rows.iter().map(map_recording_row).collect()
}

fn map_recording_row(row: &sqlx::sqlite::SqliteRow) -> Result<Recording> {
    let metadata_str: String = row.get("metadata");
    let metadata = serde_json::from_str(&metadata_str)
        .map_err(|e| Error::Internal(format!("Invalid metadata JSON in database: {}", e)))?;

    let created_at_str: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))?
        .with_timezone(&Utc);

    Ok(Recording {
        id: row.get("id"),
        batch_id: row.get("batch_id"),
        blob_ref: row.get("blob_ref"),
        metadata,
        created_at,
    })
}
