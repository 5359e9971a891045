//! File metadata records.
//!
//! A record is everything needed to find and decrypt one stored file except
//! the password. Salt and IV must never be separated from the blob they
//! belong to: losing either makes the blob unrecoverable.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use filevault_common::{Error, StorageKey};
use filevault_crypto::{Iv, KdfParams, Salt, DEFAULT_ITERATIONS, TAG_LENGTH};

/// Content type used when the uploader does not declare one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Unique identifier for a stored file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct FileId(Uuid);

impl FileId {
    /// Generate a new random file id.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FileId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FileId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s)
            .map(Self)
            .map_err(|e| Error::InvalidInput(format!("Invalid file id '{}': {}", s, e)))
    }
}

/// Metadata for one encrypted file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: FileId,
    /// Opaque owner identifier supplied by the caller.
    pub owner: String,
    pub original_name: String,
    pub content_type: String,
    /// Plaintext size in bytes.
    pub size: u64,
    /// Where the ciphertext blob lives.
    pub storage_key: StorageKey,
    pub salt: Salt,
    pub iv: Iv,
    /// Integrity tag; absent for plain CBC records.
    #[serde(default, skip_serializing_if = "Option::is_none", with = "tag_base64")]
    pub tag: Option<[u8; TAG_LENGTH]>,
    /// Iterations the key was derived with.
    #[serde(default = "default_iterations")]
    pub kdf_iterations: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl FileRecord {
    /// KDF parameters needed to re-derive this file's key.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::with_iterations(self.kdf_iterations)
    }

    /// Whether the record carries an integrity tag.
    pub fn is_sealed(&self) -> bool {
        self.tag.is_some()
    }
}

mod tag_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde::{Deserialize, Deserializer, Serializer};

    use filevault_crypto::TAG_LENGTH;

    pub fn serialize<S: Serializer>(
        tag: &Option<[u8; TAG_LENGTH]>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match tag {
            Some(tag) => serializer.serialize_some(&STANDARD.encode(tag)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<[u8; TAG_LENGTH]>, D::Error> {
        let Some(encoded) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        let bytes = STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)?;
        let tag: [u8; TAG_LENGTH] = bytes.as_slice().try_into().map_err(|_| {
            serde::de::Error::custom(format!(
                "tag must be {} bytes, got {}",
                TAG_LENGTH,
                bytes.len()
            ))
        })?;
        Ok(Some(tag))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(tag: Option<[u8; TAG_LENGTH]>) -> FileRecord {
        let now = Utc::now();
        FileRecord {
            id: FileId::new(),
            owner: "alice".to_string(),
            original_name: "report.pdf".to_string(),
            content_type: "application/pdf".to_string(),
            size: 42,
            storage_key: StorageKey::generate("report.pdf"),
            salt: Salt::generate(),
            iv: Iv::generate(),
            tag,
            kdf_iterations: DEFAULT_ITERATIONS,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_record_serialization_roundtrip() {
        for record in [sample(None), sample(Some([7u8; TAG_LENGTH]))] {
            let json = serde_json::to_string(&record).unwrap();
            let restored: FileRecord = serde_json::from_str(&json).unwrap();
            assert_eq!(restored, record);
        }
    }

    #[test]
    fn test_untagged_record_omits_tag() {
        let json = serde_json::to_value(sample(None)).unwrap();
        assert!(json.get("tag").is_none());
        assert!(json["salt"].is_string());
        assert!(json["iv"].is_string());
    }

    #[test]
    fn test_missing_iterations_default() {
        let mut json = serde_json::to_value(sample(None)).unwrap();
        json.as_object_mut().unwrap().remove("kdf_iterations");

        let record: FileRecord = serde_json::from_value(json).unwrap();
        assert_eq!(record.kdf_iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn test_bad_tag_length_rejected() {
        let mut json = serde_json::to_value(sample(None)).unwrap();
        json["tag"] = serde_json::Value::String("AAAA".to_string());
        assert!(serde_json::from_value::<FileRecord>(json).is_err());
    }

    #[test]
    fn test_file_id_parse() {
        let id = FileId::new();
        assert_eq!(id.to_string().parse::<FileId>().unwrap(), id);
        assert!(matches!(
            "not-a-uuid".parse::<FileId>(),
            Err(Error::InvalidInput(_))
        ));
    }
}
