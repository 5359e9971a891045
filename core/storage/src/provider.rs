//! Storage provider trait definition.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use filevault_common::{Result, StorageKey};

/// Metadata for a stored blob.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobMetadata {
    /// Key the blob is stored under.
    pub key: StorageKey,
    /// Size in bytes.
    pub size: u64,
    /// Last modification time.
    pub modified: DateTime<Utc>,
}

/// Storage backend for opaque ciphertext blobs.
///
/// Providers never see plaintext; they store and return bytes verbatim.
#[async_trait]
pub trait StorageProvider: Send + Sync {
    /// Get the provider name (e.g., "local", "memory").
    fn name(&self) -> &str;

    /// Store a blob, replacing any existing blob under the same key.
    ///
    /// # Postconditions
    /// - A later `get` returns exactly `data`
    ///
    /// # Errors
    /// - I/O errors
    async fn put(&self, key: &StorageKey, data: Vec<u8>) -> Result<BlobMetadata>;

    /// Fetch a blob.
    ///
    /// # Errors
    /// - `NotFound` if no blob exists under `key`
    /// - I/O errors
    async fn get(&self, key: &StorageKey) -> Result<Vec<u8>>;

    /// Check if a blob exists.
    async fn exists(&self, key: &StorageKey) -> Result<bool>;

    /// Delete a blob.
    ///
    /// # Errors
    /// - `NotFound` if no blob exists under `key`
    async fn delete(&self, key: &StorageKey) -> Result<()>;

    /// List all stored blobs, in no particular order.
    async fn list(&self) -> Result<Vec<BlobMetadata>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_serialization() {
        let metadata = BlobMetadata {
            key: StorageKey::new("00ff_test-file.txt").unwrap(),
            size: 1024,
            modified: Utc::now(),
        };

        let json = serde_json::to_string(&metadata).unwrap();
        let deserialized: BlobMetadata = serde_json::from_str(&json).unwrap();

        assert_eq!(deserialized, metadata);
    }
}
