//! Metadata index of stored files.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::record::{FileId, FileRecord};
use filevault_common::{Error, Result};

/// Index format version.
pub const INDEX_VERSION: u32 = 1;

/// All file records of a vault, keyed by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileIndex {
    version: u32,
    files: BTreeMap<FileId, FileRecord>,
}

impl FileIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self {
            version: INDEX_VERSION,
            files: BTreeMap::new(),
        }
    }

    /// Add a record.
    ///
    /// # Errors
    /// - `AlreadyExists` if the id is taken
    pub fn insert(&mut self, record: FileRecord) -> Result<()> {
        if self.files.contains_key(&record.id) {
            return Err(Error::AlreadyExists(format!("File {} already indexed", record.id)));
        }
        self.files.insert(record.id, record);
        Ok(())
    }

    /// Remove and return a record.
    pub fn remove(&mut self, id: &FileId) -> Option<FileRecord> {
        self.files.remove(id)
    }

    /// Look up a record owned by `owner`.
    ///
    /// Records of other owners are reported as missing.
    pub fn get(&self, owner: &str, id: &FileId) -> Result<&FileRecord> {
        self.files
            .get(id)
            .filter(|record| record.owner == owner)
            .ok_or_else(|| Error::NotFound(format!("File not found: {}", id)))
    }

    /// Records owned by `owner`, newest first.
    pub fn for_owner(&self, owner: &str) -> Vec<&FileRecord> {
        let mut records: Vec<&FileRecord> = self
            .files
            .values()
            .filter(|record| record.owner == owner)
            .collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        records
    }

    /// Total number of records across all owners.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Serialize to bytes for storage.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(self)?)
    }

    /// Deserialize from bytes.
    ///
    /// # Errors
    /// - Invalid JSON
    /// - Unsupported index version
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let index: Self = serde_json::from_slice(bytes)?;
        if index.version != INDEX_VERSION {
            return Err(Error::Serialization(format!(
                "Unsupported index version: {}",
                index.version
            )));
        }
        Ok(index)
    }
}

impl Default for FileIndex {
    fn default() -> Self {
        Self::new()
    }
}
