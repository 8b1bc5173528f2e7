use async_trait::async_trait;
use bytes::Bytes;
use std::time::Duration;
use thiserror::Error;

pub mod s3;

pub use s3::S3Storage;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("upload failed: {0}")]
    Upload(String),

    #[error("presign failed: {0}")]
    Presign(String),
}

/// Seam between the attachment pipeline and the object store. The production
/// implementation is S3; tests use counting mocks.
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    async fn put(&self, key: &str, data: Bytes, content_type: &str) -> Result<(), StorageError>;

    /// Exchange a stable object key for a short-lived signed GET URL.
    async fn presign_get(&self, key: &str, ttl: Duration) -> Result<String, StorageError>;
}
