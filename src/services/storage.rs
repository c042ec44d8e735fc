//! Photo byte storage.
//!
//! DESIGN
//! ======
//! `PhotoStorage` is the seam between the upload pipeline and where bytes
//! live. The server ships a local-disk backend whose directory is served
//! statically under the media URL prefix; keys are `<uploader>/<uuid>.<ext>`
//! and never contain `..` or a leading `/`.

use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("invalid storage key: {0}")]
    InvalidKey(String),
    #[error("storage io error: {0}")]
    Io(#[from] std::io::Error),
}

#[async_trait]
pub trait PhotoStorage: Send + Sync {
    /// Store `bytes` under `key`, returning the public URL.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError>;

    /// Remove a stored object. Missing objects are not an error.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// The key behind a URL this backend returned from `put`.
    fn key_for_url(&self, url: &str) -> Option<String>;
}

/// Delete the stored objects behind `urls`. Failures are logged, not returned.
pub async fn remove_urls<'a>(storage: &dyn PhotoStorage, urls: impl IntoIterator<Item = &'a str>) {
    for url in urls {
        let Some(key) = storage.key_for_url(url) else {
            tracing::warn!(url, "photo url not owned by storage");
            continue;
        };
        if let Err(e) = storage.delete(&key).await {
            tracing::warn!(error = %e, key, "stored photo not removed");
        }
    }
}

/// File extension for an accepted image content type.
#[must_use]
pub fn extension_for(content_type: &str) -> Option<&'static str> {
    let essence = content_type.split(';').next().unwrap_or_default().trim().to_ascii_lowercase();
    match essence.as_str() {
        "image/jpeg" | "image/jpg" => Some("jpg"),
        "image/png" => Some("png"),
        "image/webp" => Some("webp"),
        "image/gif" => Some("gif"),
        "image/heic" => Some("heic"),
        _ => None,
    }
}

#[must_use]
pub fn photo_key(uploaded_by: Uuid, extension: &str) -> String {
    format!("{uploaded_by}/{}.{extension}", Uuid::new_v4())
}

fn checked_relative(key: &str) -> Result<&Path, StorageError> {
    let path = Path::new(key);
    let clean = !key.is_empty() && path.components().all(|c| matches!(c, Component::Normal(_)));
    if clean { Ok(path) } else { Err(StorageError::InvalidKey(key.to_owned())) }
}

// =============================================================================
// LOCAL DISK
// =============================================================================

pub struct LocalDiskStorage {
    root: PathBuf,
    url_prefix: String,
}

impl LocalDiskStorage {
    pub fn new(root: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self { root: root.into(), url_prefix: url_prefix.into() }
    }

    fn url_for(&self, key: &str) -> String {
        format!("{}/{key}", self.url_prefix)
    }
}

#[async_trait]
impl PhotoStorage for LocalDiskStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        let path = self.root.join(checked_relative(key)?);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, bytes).await?;
        tracing::debug!(key, bytes = bytes.len(), "photo stored");
        Ok(self.url_for(key))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let path = self.root.join(checked_relative(key)?);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        let key = url.strip_prefix(self.url_prefix.as_str())?.strip_prefix('/')?;
        checked_relative(key).ok().map(|_| key.to_owned())
    }
}

// =============================================================================
// IN-MEMORY (tests)
// =============================================================================

#[cfg(test)]
#[derive(Default)]
pub(crate) struct MemoryStorage {
    pub objects: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

#[cfg(test)]
#[async_trait]
impl PhotoStorage for MemoryStorage {
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<String, StorageError> {
        checked_relative(key)?;
        self.objects
            .lock()
            .map_err(|_| StorageError::InvalidKey(key.to_owned()))?
            .insert(key.to_owned(), bytes.to_vec());
        Ok(format!("/media/{key}"))
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.objects
            .lock()
            .map_err(|_| StorageError::InvalidKey(key.to_owned()))?
            .remove(key);
        Ok(())
    }

    fn key_for_url(&self, url: &str) -> Option<String> {
        url.strip_prefix("/media/").map(str::to_owned)
    }
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
