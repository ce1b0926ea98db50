use std::path::Path;
use std::sync::Arc;

use bytes::Bytes;

use super::{BlobReader, ObjectStore, ObjectStoreError};

/// 50 MiB
pub const DEFAULT_MAX_BLOB_SIZE: u64 = 50 * 1024 * 1024;

const MAX_EXTENSION_LEN: usize = 16;

/// Content store for uploaded files, keyed by generated internal names.
///
/// Wraps an [`ObjectStore`] backend and owns the naming and size policy, so
/// backends only ever see keys this type produced.
#[derive(Clone)]
pub struct BlobStore {
    backend: Arc<dyn ObjectStore>,
    max_size: u64,
}

impl BlobStore {
    pub fn new(backend: Arc<dyn ObjectStore>, max_size: u64) -> Self {
        Self { backend, max_size }
    }

    pub fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Store `data` under a fresh unique name that keeps the extension of
    /// `original_name`. Oversized payloads are rejected before the backend is touched.
    pub async fn write(&self, data: Bytes, original_name: &str) -> Result<String, ObjectStoreError> {
        let size = data.len() as u64;
        if size > self.max_size {
            return Err(ObjectStoreError::PayloadTooLarge {
                size,
                limit: self.max_size,
            });
        }

        let internal_name = internal_name_for(original_name);
        self.backend.put(&internal_name, data).await?;
        Ok(internal_name)
    }

    pub async fn read(&self, internal_name: &str) -> Result<Bytes, ObjectStoreError> {
        self.backend.get(internal_name).await
    }

    pub async fn open(&self, internal_name: &str) -> Result<BlobReader, ObjectStoreError> {
        self.backend.open(internal_name).await
    }

    /// Idempotent: deleting a missing blob succeeds.
    pub async fn delete(&self, internal_name: &str) -> Result<(), ObjectStoreError> {
        match self.backend.delete(internal_name).await {
            Err(ObjectStoreError::NotFound(_)) => Ok(()),
            other => other,
        }
    }

    pub async fn exists(&self, internal_name: &str) -> Result<bool, ObjectStoreError> {
        self.backend.exists(internal_name).await
    }
}

/// `<uuid>.<ext>`, or a bare uuid when the original name has no usable extension.
fn internal_name_for(original_name: &str) -> String {
    let id = uuid::Uuid::new_v4();
    match sanitized_extension(original_name) {
        Some(ext) => format!("{id}.{ext}"),
        None => id.to_string(),
    }
}

fn sanitized_extension(original_name: &str) -> Option<String> {
    let ext = Path::new(original_name).extension()?.to_str()?;
    if ext.is_empty()
        || ext.len() > MAX_EXTENSION_LEN
        || !ext.chars().all(|c| c.is_ascii_alphanumeric())
    {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}
