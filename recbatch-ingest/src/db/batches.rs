//! Batch record operations
//!
//! A batch row holds identity and creation time only. Status is never
//! stored; it is derived from slot and recording state at read time.

use chrono::{DateTime, Utc};
use recbatch_common::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Batch record
#[derive(Debug, Clone)]
pub struct Batch {
    pub id: String,
    pub created_at: DateTime<Utc>,
}

/// Load a batch by id
pub async fn get_batch(pool: &SqlitePool, batch_id: &str) -> Result<Option<Batch>> {
    let row = sqlx::query("SELECT id, created_at FROM batches WHERE id = ?")
        .bind(batch_id)
        .fetch_optional(pool)
        .await?;

    match row {
        Some(row) => Ok(Some(map_batch_row(&row)?)),
        None => Ok(None),
    }
}

/// Load all batches, newest first
pub async fn list_batches(pool: &SqlitePool) -> Result<Vec<Batch>> {
    let rows = sqlx::query("SELECT id, created_at FROM batches ORDER BY created_at DESC, id")
        .fetch_all(pool)
        .await?;

    rows.iter().map(map_batch_row).collect()
}

fn map_batch_row(row: &sqlx::sqlite::SqliteRow) -> Result<Batch> {
    let created_at_str: String = row.get("created_at");
    let created_at = DateTime::parse_from_rfc3339(&created_at_str)
        .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))?
        .with_timezone(&Utc);

    Ok(Batch {
        id: row.get("id"),
        created_at,
    })
}
