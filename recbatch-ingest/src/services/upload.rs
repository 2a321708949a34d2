//! Upload receiver
//!
//! Consumes a presign token plus bytes. Expiry is noticed lazily here (no
//! background sweep required): the first attempt past the window flips the
//! slot to expired, which permanently rejects replays of the stale token.
//! The pending -> fulfilled transition is a conditional UPDATE, so two
//! concurrent PUTs against one slot cannot both claim success.

use chrono::Utc;
use sqlx::SqlitePool;

use crate::db;
use crate::db::blobs::BlobRecord;
use crate::db::slots::SlotState;
use crate::error::{ApiError, ApiResult};
use crate::store::BlobStore;

/// Result of a successful upload
#[derive(Debug, Clone)]
pub struct UploadOutcome {
    pub blob_ref: String,
    pub byte_length: i64,
}

/// Upload receiver
pub struct UploadReceiver {
    db: SqlitePool,
    store: BlobStore,
}

impl UploadReceiver {
    pub fn new(db: SqlitePool, store: BlobStore) -> Self {
        Self { db, store }
    }

    /// Validate the token, persist the bytes content-addressed, and mark
    /// the slot fulfilled.
    pub async fn receive(
        &self,
        upload_id: &str,
        token: &str,
        content_type: &str,
        bytes: &[u8],
    ) -> ApiResult<UploadOutcome> {
        // Unknown slot and wrong token are indistinguishable to the
        // caller: neither leaks whether the upload id exists.
        let slot = db::slots::load_slot(&self.db, upload_id)
            .await?
            .ok_or(ApiError::InvalidToken)?;
        if slot.token != token {
            return Err(ApiError::InvalidToken);
        }

        match slot.state {
            SlotState::Fulfilled => return Err(ApiError::AlreadyFulfilled),
            SlotState::Expired => return Err(ApiError::TokenExpired),
            SlotState::Pending => {}
        }

        let now = Utc::now();
        if now > slot.expires_at {
            // Lazy transition; the CAS no-ops if a concurrent upload just
            // fulfilled the slot, and the token is rejected either way
            db::slots::expire_slot(&self.db, upload_id).await?;
            tracing::info!(upload_id = %upload_id, "Rejected upload with lapsed token");
            return Err(ApiError::TokenExpired);
        }

        let presented = media_type(content_type);
        let declared = media_type(&slot.content_type);
        if presented != declared {
            return Err(ApiError::ContentTypeMismatch {
                expected: declared.to_string(),
                actual: presented.to_string(),
            });
        }

        let stored = self
            .store
            .store(bytes)
            .await
            .map_err(|e| ApiError::StorageFailure(e.to_string()))?;

        db::blobs::insert_blob(
            &self.db,
            &BlobRecord {
                blob_ref: stored.blob_ref.clone(),
                byte_length: stored.byte_length,
                content_type: slot.content_type.clone(),
                created_at: now,
            },
        )
        .await?;

        if !db::slots::fulfill_slot(&self.db, upload_id, &stored.blob_ref).await? {
            // Lost the race: another call transitioned the slot first
            let current = db::slots::load_slot(&self.db, upload_id).await?;
            return match current.map(|s| s.state) {
                Some(SlotState::Fulfilled) => Err(ApiError::AlreadyFulfilled),
                _ => Err(ApiError::TokenExpired),
            };
        }

        tracing::info!(
            upload_id = %upload_id,
            batch_id = %slot.batch_id,
            blob_ref = %stored.blob_ref,
            byte_length = stored.byte_length,
            "Upload fulfilled"
        );

        Ok(UploadOutcome {
            blob_ref: stored.blob_ref,
            byte_length: stored.byte_length,
        })
    }
}

/// Strip parameters from a content type header value (`audio/wav; x=y`
/// compares as `audio/wav`)
fn media_type(value: &str) -> &str {
    value.split(';').next().unwrap_or("").trim()
}
