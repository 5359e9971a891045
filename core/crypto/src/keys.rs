//! Key material with secure memory handling.
//!
//! The derived key zeroizes its memory on drop. Salts and IVs are public
//! values stored next to the ciphertext, so they only get base64 serde.

use base64::{engine::general_purpose::STANDARD, Engine as _};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop};

use filevault_common::{Error, Result};

/// Length of the derived key in bytes (256-bit).
pub const KEY_LENGTH: usize = 32;

/// Length of the key-derivation salt in bytes.
pub const SALT_LENGTH: usize = 16;

/// Length of the CBC initialization vector in bytes (one AES block).
pub const IV_LENGTH: usize = 16;

/// Key derived from a password and a salt.
///
/// Lives for a single encrypt or decrypt call and is never persisted.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey {
    key: [u8; KEY_LENGTH],
}

impl DerivedKey {
    /// Wrap raw key bytes.
    pub fn from_bytes(key: [u8; KEY_LENGTH]) -> Self {
        Self { key }
    }

    /// Get the key bytes.
    ///
    /// # Security
    /// The returned slice should be used immediately and not stored.
    pub fn as_bytes(&self) -> &[u8; KEY_LENGTH] {
        &self.key
    }
}

impl fmt::Debug for DerivedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DerivedKey([REDACTED])")
    }
}

macro_rules! random_block {
    ($(#[$doc:meta])* $name:ident, $len:expr, $label:literal) => {
        $(#[$doc])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub struct $name([u8; $len]);

        impl $name {
            /// Generate fresh bytes from the OS random source.
            pub fn generate() -> Self {
                let mut bytes = [0u8; $len];
                OsRng.fill_bytes(&mut bytes);
                Self(bytes)
            }

            /// Create from bytes.
            pub fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Create from a slice, checking its length.
            ///
            /// # Errors
            /// - Returns `InvalidInput` if the slice is not exactly the right length
            pub fn from_slice(bytes: &[u8]) -> Result<Self> {
                let array: [u8; $len] = bytes.try_into().map_err(|_| {
                    Error::InvalidInput(format!(
                        "{} must be {} bytes, got {}",
                        $label,
                        $len,
                        bytes.len()
                    ))
                })?;
                Ok(Self(array))
            }

            /// Get the bytes.
            pub fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.serialize_str(&STANDARD.encode(self.0))
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let encoded = String::deserialize(deserializer)?;
                let bytes = STANDARD
                    .decode(encoded.as_bytes())
                    .map_err(serde::de::Error::custom)?;
                Self::from_slice(&bytes).map_err(serde::de::Error::custom)
            }
        }
    };
}

random_block!(
    /// Salt for key derivation, fresh for every encryption.
    Salt,
    SALT_LENGTH,
    "Salt"
);

random_block!(
    /// CBC initialization vector, fresh for every encryption.
    Iv,
    IV_LENGTH,
    "IV"
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_salt_generate() {
        let salt1 = Salt::generate();
        let salt2 = Salt::generate();

        // Random salts should be different
        assert_ne!(salt1, salt2);
    }

    #[test]
    fn test_iv_from_slice_checks_length() {
        assert!(Iv::from_slice(&[0u8; IV_LENGTH]).is_ok());
        assert!(matches!(
            Iv::from_slice(&[0u8; 8]),
            Err(Error::InvalidInput(_))
        ));
        assert!(Salt::from_slice(&[0u8; 32]).is_err());
    }

    #[test]
    fn test_salt_serializes_as_base64() {
        let salt = Salt::from_bytes([0xAB; SALT_LENGTH]);
        let json = serde_json::to_string(&salt).unwrap();
        assert_eq!(json, "\"q6urq6urq6urq6urq6urqw==\"");

        let restored: Salt = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, salt);
    }

    #[test]
    fn test_iv_rejects_short_base64() {
        assert!(serde_json::from_str::<Iv>("\"AAAA\"").is_err());
    }

    #[test]
    fn test_derived_key_debug_is_redacted() {
        let key = DerivedKey::from_bytes([7u8; KEY_LENGTH]);
        assert_eq!(format!("{:?}", key), "DerivedKey([REDACTED])");
    }
}
