//! In-memory storage provider for testing.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

use crate::provider::{BlobMetadata, StorageProvider};
use filevault_common::{Error, Result, StorageKey};

#[derive(Debug, Clone)]
struct Entry {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

impl Entry {
    fn metadata(&self, key: &StorageKey) -> BlobMetadata {
        BlobMetadata {
            key: key.clone(),
            size: self.data.len() as u64,
            modified: self.modified,
        }
    }
}

/// In-memory storage provider.
///
/// Useful for testing and development. All data is stored in memory
/// and lost on drop.
#[derive(Default)]
pub struct MemoryProvider {
    blobs: RwLock<HashMap<StorageKey, Entry>>,
}

impl MemoryProvider {
    /// Create a new empty memory provider.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageProvider for MemoryProvider {
    fn name(&self) -> &str {
        "memory"
    }

    async fn put(&self, key: &StorageKey, data: Vec<u8>) -> Result<BlobMetadata> {
        let entry = Entry {
            data,
            modified: Utc::now(),
        };
        let metadata = entry.metadata(key);
        self.blobs.write().await.insert(key.clone(), entry);
        Ok(metadata)
    }

    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>> {
        self.blobs
            .read()
            .await
            .get(key)
            .map(|entry| entry.data.clone())
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", key)))
    }

    async fn exists(&self, key: &StorageKey) -> Result<bool> {
        Ok(self.blobs.read().await.contains_key(key))
    }

    async fn delete(&self, key: &StorageKey) -> Result<()> {
        self.blobs
            .write()
            .await
            .remove(key)
            .map(|_| ())
            .ok_or_else(|| Error::NotFound(format!("Blob not found: {}", key)))
    }

    async fn list(&self) -> Result<Vec<BlobMetadata>> {
        Ok(self
            .blobs
            .read()
            .await
            .iter()
            .map(|(key, entry)| entry.metadata(key))
            .collect())
    }
}
