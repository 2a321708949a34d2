//! Content-addressed blob storage
//!
//! Bytes are stored once under their SHA-256 hex digest. Writes go through
//! a uniquely named temp file followed by a rename, so two concurrent
//! writers of identical content converge on the same final file and
//! neither ever observes a partial object.

use sha2::{Digest, Sha256};
use std::io;
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// Result of storing bytes
#[derive(Debug, Clone)]
pub struct StoredBlob {
    /// Content-derived ref (SHA-256 hex of the bytes)
    pub blob_ref: String,
    pub byte_length: i64,
}

/// Compute the content ref for a byte slice
pub fn content_ref(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// File-backed content-addressed store
#[derive(Debug, Clone)]
pub struct BlobStore {
    root: PathBuf,
}

impl BlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Create the storage directory if missing
    pub fn ensure_directory_exists(&self) -> io::Result<()> {
        std::fs::create_dir_all(&self.root)
    }

    /// On-disk path for a blob ref
    pub fn path_for(&self, blob_ref: &str) -> PathBuf {
        self.root.join(format!("{}.bin", blob_ref))
    }

    /// Durably store bytes under their content ref. Idempotent: storing
    /// identical content again is a no-op returning the same ref.
    pub async fn store(&self, bytes: &[u8]) -> io::Result<StoredBlob> {
        let blob_ref = content_ref(bytes);
        let byte_length = bytes.len() as i64;
        let final_path = self.path_for(&blob_ref);

        if tokio::fs::try_exists(&final_path).await? {
            tracing::debug!(blob_ref = %blob_ref, "Blob already stored, skipping write");
            return Ok(StoredBlob { blob_ref, byte_length });
        }

        // Unique temp name per writer; rename is atomic on the same
        // filesystem, so the last rename wins with identical content.
        let tmp_path = self
            .root
            .join(format!("{}.tmp.{}", blob_ref, Uuid::new_v4().simple()));
        tokio::fs::write(&tmp_path, bytes).await?;
        match tokio::fs::rename(&tmp_path, &final_path).await {
            Ok(()) => {}
            Err(e) => {
                let _ = tokio::fs::remove_file(&tmp_path).await;
                return Err(e);
            }
        }

        tracing::debug!(blob_ref = %blob_ref, byte_length, "Stored blob");
        Ok(StoredBlob { blob_ref, byte_length })
    }

    /// Read a stored blob back
    pub async fn read(&self, blob_ref: &str) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.path_for(blob_ref)).await
    }

    /// True if the blob exists on disk
    pub async fn exists(&self, blob_ref: &str) -> io::Result<bool> {
        tokio::fs::try_exists(self.path_for(blob_ref)).await
    }

    /// Re-hash a stored blob and compare against its ref
    pub async fn verify(&self, blob_ref: &str) -> io::Result<bool> {
        let bytes = self.read(blob_ref).await?;
        Ok(content_ref(&bytes) == blob_ref)
    }

    /// Remove a stored blob; missing files are not an error
    pub async fn remove(&self, blob_ref: &str) -> io::Result<()> {
        match tokio::fs::remove_file(self.path_for(blob_ref)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
