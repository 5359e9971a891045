//! Common types used throughout FileVault.

use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use zeroize::Zeroize;

/// Number of random bytes prefixed to generated storage keys.
const KEY_PREFIX_BYTES: usize = 8;

/// Longest file-name suffix kept in a generated storage key.
const MAX_NAME_SUFFIX: usize = 128;

/// Name of an opaque ciphertext blob in a storage provider.
///
/// Keys are flat: they never contain path separators and cannot
/// address anything outside the provider root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    /// Create a storage key from a string.
    ///
    /// # Errors
    /// - Returns error if the key is empty, `.` or `..`
    /// - Returns error if the key contains a path separator or a NUL byte
    pub fn new(key: impl Into<String>) -> crate::Result<Self> {
        let key = key.into();
        if key.is_empty() {
            return Err(crate::Error::InvalidInput(
                "Storage key cannot be empty".to_string(),
            ));
        }
        if key == "." || key == ".." {
            return Err(crate::Error::InvalidInput(format!(
                "Storage key cannot be '{}'",
                key
            )));
        }
        if key.contains(['/', '\\', '\0']) {
            return Err(crate::Error::InvalidInput(
                "Storage key cannot contain separators".to_string(),
            ));
        }
        Ok(Self(key))
    }

    /// Generate a fresh unique key for a blob holding `original_name`.
    ///
    /// The key is `<16 hex chars>_<sanitized name>`. The random prefix makes
    /// keys unique; the suffix only helps humans browsing the blob directory.
    pub fn generate(original_name: &str) -> Self {
        let mut prefix = [0u8; KEY_PREFIX_BYTES];
        OsRng.fill_bytes(&mut prefix);
        Self(format!("{}_{}", hex::encode(prefix), sanitize_name(original_name)))
    }

    /// Get the inner string value.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for StorageKey {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Make a user-supplied file name safe to embed in a storage key.
fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len().min(MAX_NAME_SUFFIX));
    for c in name.chars() {
        if out.len() + c.len_utf8() > MAX_NAME_SUFFIX {
            break;
        }
        if c == '/' || c == '\\' || c.is_control() {
            out.push('_');
        } else {
            out.push(c);
        }
    }
    if out.is_empty() {
        out.push_str("file");
    }
    out
}

/// Sensitive data wrapper that zeroizes on drop.
#[derive(Clone, Zeroize)]
#[zeroize(drop)]
pub struct SensitiveBytes(Vec<u8>);

impl SensitiveBytes {
    /// Create new sensitive bytes.
    pub fn new(data: Vec<u8>) -> Self {
        Self(data)
    }

    /// Get a reference to the inner bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Get the length.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for SensitiveBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SensitiveBytes([REDACTED; {} bytes])", self.0.len())
    }
}
