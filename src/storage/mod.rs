//! Object storage port used for uploaded images.

use async_trait::async_trait;
use bytes::Bytes;

use crate::errors::ServiceError;

pub mod local;

pub use local::LocalObjectStorage;

/// Bucket holding customer payment proof images
pub const PAYMENT_PROOFS_BUCKET: &str = "payment-proofs";

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStorage: Send + Sync {
    /// Stores `bytes` at `path` inside `bucket` and returns the public URL.
    async fn upload(&self, bucket: &str, path: &str, bytes: Bytes) -> Result<String, ServiceError>;

    async fn remove(&self, bucket: &str, paths: Vec<String>) -> Result<(), ServiceError>;

    fn public_url(&self, bucket: &str, path: &str) -> String;
}

/// Rejects object keys that could escape their bucket.
pub(crate) fn validate_object_key(key: &str) -> Result<(), ServiceError> {
    let valid = !key.is_empty()
        && !key.starts_with('/')
        && !key.contains('\\')
        && key
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..");
    if valid {
        Ok(())
    } else {
        Err(ServiceError::StorageError(format!(
            "invalid object key '{}'",
            key
        )))
    }
}
