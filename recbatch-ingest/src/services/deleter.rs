//! Batch deletion
//!
//! Removes a batch with its slots and recordings in one transaction.
//! Stored blob files are content-addressed and may be shared with other
//! batches, so a file is only removed once no surviving slot or recording
//! references its ref.

use sqlx::SqlitePool;

use crate::error::{ApiError, ApiResult};
use crate::store::BlobStore;

/// Batch deleter
pub struct BatchDeleter {
    db: SqlitePool,
    store: BlobStore,
}

impl BatchDeleter {
    pub fn new(db: SqlitePool, store: BlobStore) -> Self {
        Self { db, store }
    }

    /// Delete a batch and everything it owns. Returns the refs whose
    /// stored bytes were removed.
    pub async fn delete(&self, batch_id: &str) -> ApiResult<Vec<String>> {
        let mut tx = self.db.begin().await?;

        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM batches WHERE id = ?")
            .bind(batch_id)
            .fetch_optional(&mut *tx)
            .await?;
        if exists.is_none() {
            return Err(ApiError::UnknownBatch(batch_id.to_string()));
        }

        // Refs this batch touches, from both slots and recordings
        let refs: Vec<(String,)> = sqlx::query_as(
            r#"
            SELECT DISTINCT blob_ref FROM upload_slots
                WHERE batch_id = ?1 AND blob_ref IS NOT NULL
            UNION
            SELECT DISTINCT blob_ref FROM recordings WHERE batch_id = ?1
            "#,
        )
        .bind(batch_id)
        .fetch_all(&mut *tx)
        .await?;

        // Of those, keep the ones still referenced outside this batch
        let mut orphaned = Vec::new();
        for (blob_ref,) in &refs {
            let outside: i64 = sqlx::query_scalar(
                r#"
                SELECT
                    (SELECT COUNT(*) FROM upload_slots WHERE blob_ref = ?1 AND batch_id != ?2)
                  + (SELECT COUNT(*) FROM recordings WHERE blob_ref = ?1 AND batch_id != ?2)
                "#,
            )
            .bind(blob_ref)
            .bind(batch_id)
            .fetch_one(&mut *tx)
            .await?;
            if outside == 0 {
                orphaned.push(blob_ref.clone());
            }
        }

        sqlx::query("DELETE FROM recordings WHERE batch_id = ?")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM upload_slots WHERE batch_id = ?")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;
        for blob_ref in &orphaned {
            sqlx::query("DELETE FROM blobs WHERE blob_ref = ?")
                .bind(blob_ref)
                .execute(&mut *tx)
                .await?;
        }
        sqlx::query("DELETE FROM batches WHERE id = ?")
            .bind(batch_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        // File removal is best-effort after the records are gone; a
        // leftover file is unreachable and harmless
        for blob_ref in &orphaned {
            if let Err(e) = self.store.remove(blob_ref).await {
                tracing::warn!(blob_ref = %blob_ref, "Could not delete stored blob: {}", e);
            }
        }

        tracing::info!(
            batch_id = %batch_id,
            removed_blobs = orphaned.len(),
            "Deleted batch"
        );

        Ok(orphaned)
    }
}
