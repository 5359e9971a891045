//! Local filesystem storage provider.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::debug;
use uuid::Uuid;

use crate::provider::{BlobMetadata, StorageProvider};
use filevault_common::{Error, Result, StorageKey};

/// Prefix of in-flight temporary files, skipped by `list`.
const TEMP_PREFIX: &str = ".tmp-";

/// Local filesystem storage provider.
///
/// Each blob is a single file directly under the root directory.
pub struct LocalProvider {
    root: PathBuf,
}

impl LocalProvider {
    /// Create a new local provider with the given root directory.
    ///
    /// # Postconditions
    /// - Root directory is created if it doesn't exist
    ///
    /// # Errors
    /// - Root exists but is not a directory
    /// - Permission denied
    pub fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        // Create root if it doesn't exist (sync for constructor)
        if !root.exists() {
            std::fs::create_dir_all(&root)?;
        } else if !root.is_dir() {
            return Err(Error::Storage(format!(
                "Storage root is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self { root })
    }

    /// Get the root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn blob_path(&self, key: &StorageKey) -> PathBuf {
        self.root.join(key.as_str())
    }

    fn create_metadata(key: StorageKey, fs_meta: &std::fs::Metadata) -> BlobMetadata {
        let modified: DateTime<Utc> = fs_meta
            .modified()
            .map(|t| t.into())
            .unwrap_or_else(|_| Utc::now());

        BlobMetadata {
            key,
            size: fs_meta.len(),
            modified,
        }
    }
}

fn not_found(key: &StorageKey) -> Error {
    Error::NotFound(format!("Blob not found: {}", key))
}

#[async_trait]
impl StorageProvider for LocalProvider {
    fn name(&self) -> &str {
        "local"
    }

    async fn put(&self, key: &StorageKey, data: Vec<u8>) -> Result<BlobMetadata> {
        let path = self.blob_path(key);
        let temp = self
            .root
            .join(format!("{}{}", TEMP_PREFIX, Uuid::new_v4().simple()));

        // Write then rename so readers never observe a partial blob.
        fs::write(&temp, &data).await?;
        if let Err(e) = fs::rename(&temp, &path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(e.into());
        }

        debug!(key = %key, size = data.len(), "Stored blob");
        let fs_meta = fs::metadata(&path).await?;
        Ok(Self::create_metadata(key.clone(), &fs_meta))
    }

    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>> {
        match fs::read(self.blob_path(key)).await {
            Ok(data) => Ok(data),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool> {
        Ok(fs::try_exists(self.blob_path(key)).await?)
    }

    async fn delete(&self, key: &StorageKey) -> Result<()> {
        match fs::remove_file(self.blob_path(key)).await {
            Ok(()) => {
                debug!(key = %key, "Deleted blob");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Err(not_found(key)),
            Err(e) => Err(e.into()),
        }
    }

    async fn list(&self) -> Result<Vec<BlobMetadata>> {
        let mut results = Vec::new();
        let mut entries = fs::read_dir(&self.root).await?;

        while let Some(entry) = entries.next_entry().await? {
            let fs_meta = entry.metadata().await?;
            if !fs_meta.is_file() {
                continue;
            }

            let name = match entry.file_name().into_string() {
                Ok(name) if !name.starts_with(TEMP_PREFIX) => name,
                _ => continue,
            };

            if let Ok(key) = StorageKey::new(name) {
                results.push(Self::create_metadata(key, &fs_meta));
            }
        }

        Ok(results)
    }
}
