use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

use super::{validate_object_key, ObjectStorage};
use crate::errors::ServiceError;

/// Filesystem-backed buckets, one directory per bucket under `root`.
#[derive(Debug, Clone)]
pub struct LocalObjectStorage {
    root: PathBuf,
    public_base_url: String,
}

impl LocalObjectStorage {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn object_path(&self, bucket: &str, key: &str) -> Result<PathBuf, ServiceError> {
        validate_object_key(bucket)?;
        validate_object_key(key)?;
        Ok(self.root.join(bucket).join(key))
    }
}

#[async_trait]
impl ObjectStorage for LocalObjectStorage {
    async fn upload(&self, bucket: &str, path: &str, bytes: Bytes) -> Result<String, ServiceError> {
        let full_path = self.object_path(bucket, path)?;
        let parent = full_path
            .parent()
            .ok_or_else(|| ServiceError::StorageError(format!("invalid object key '{}'", path)))?;

        tokio::fs::create_dir_all(parent).await.map_err(|e| {
            ServiceError::StorageError(format!("failed to create bucket directory: {e}"))
        })?;

        // Write to a temp file first so readers never see a partial object.
        let tmp_path = parent.join(format!(".upload.tmp.{}", uuid::Uuid::new_v4()));
        if let Err(e) = tokio::fs::write(&tmp_path, &bytes).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ServiceError::StorageError(format!(
                "failed to write object: {e}"
            )));
        }
        if let Err(e) = tokio::fs::rename(&tmp_path, &full_path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(ServiceError::StorageError(format!(
                "failed to finalize object: {e}"
            )));
        }

        debug!(bucket, path, size = bytes.len(), "object stored");
        Ok(self.public_url(bucket, path))
    }

    async fn remove(&self, bucket: &str, paths: Vec<String>) -> Result<(), ServiceError> {
        for path in paths {
            let full_path = self.object_path(bucket, &path)?;
            match tokio::fs::remove_file(&full_path).await {
                Ok(()) => debug!(bucket, path = %path, "object removed"),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    warn!(bucket, path = %path, "object already absent");
                }
                Err(e) => {
                    return Err(ServiceError::StorageError(format!(
                        "failed to remove {path}: {e}"
                    )))
                }
            }
        }
        Ok(())
    }

    fn public_url(&self, bucket: &str, path: &str) -> String {
        format!("{}/{}/{}", self.public_base_url, bucket, path)
    }
}
