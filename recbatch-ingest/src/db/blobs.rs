//! Blob record operations
//!
//! A blob row describes one content-addressed object. Rows are write-once:
//! the ref is the SHA-256 of the bytes, so a second insert of the same ref
//! is the same object and is ignored.

use chrono::{DateTime, Utc};
use recbatch_common::{Error, Result};
use sqlx::{Row, SqlitePool};

/// Stored blob record
#[derive(Debug, Clone)]
pub struct BlobRecord {
    pub blob_ref: String,
    pub byte_length: i64,
    pub content_type: String,
    pub created_at: DateTime<Utc>,
}

/// Insert a blob record; idempotent on the ref
pub async fn insert_blob(pool: &SqlitePool, blob: &BlobRecord) -> Result<()> {
    sqlx::query(
        r#"
        INSERT OR IGNORE INTO blobs (blob_ref, byte_length, content_type, created_at)
        VALUES (?, ?, ?, ?)
        "#,
    )
    .bind(&blob.blob_ref)
    .bind(blob.byte_length)
    .bind(&blob.content_type)
    .bind(blob.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

/// Load a blob record by ref
pub async fn load_blob(pool: &SqlitePool, blob_ref: &str) -> Result<Option<BlobRecord>> {
    let row = sqlx::query(
        "SELECT blob_ref, byte_length, content_type, created_at FROM blobs WHERE blob_ref = ?",
    )
    .bind(blob_ref)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let created_at_str: String = row.get("created_at");
            let created_at = DateTime::parse_from_rfc3339(&created_at_str)
                .map_err(|e| Error::Internal(format!("Invalid timestamp in database: {}", e)))?
                .with_timezone(&Utc);

            Ok(Some(BlobRecord {
                blob_ref: row.get("blob_ref"),
                byte_length: row.get("byte_length"),
                content_type: row.get("content_type"),
                created_at,
            }))
        }
        None => Ok(None),
    }
}

/// Count live references to a blob ref from slots and recordings outside
/// the given batch. Zero means the object is unreachable once that batch
/// is deleted.
pub async fn references_outside_batch(
    pool: &SqlitePool,
    blob_ref: &str,
    batch_id: &str,
) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT
            (SELECT COUNT(*) FROM upload_slots WHERE blob_ref = ?1 AND batch_id != ?2)
          + (SELECT COUNT(*) FROM recordings WHERE blob_ref = ?1 AND batch_id != ?2)
        "#,
    )
    .bind(blob_ref)
    .bind(batch_id)
    .fetch_one(pool)
    .await?;

    Ok(count)
}
