//! Key derivation using PBKDF2-HMAC-SHA256.
//!
//! The iteration count makes each password guess expensive. The salt keeps
//! identical passwords from producing identical keys across files.

use hmac::Hmac;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::keys::{DerivedKey, Salt, KEY_LENGTH};
use filevault_common::{Error, Result};

/// Iteration count used for every stored file unless configured otherwise.
pub const DEFAULT_ITERATIONS: u32 = 100_000;

/// Parameters for PBKDF2 key derivation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Number of HMAC-SHA256 iterations.
    pub iterations: u32,
}

impl KdfParams {
    /// Create parameters with an explicit iteration count.
    pub fn with_iterations(iterations: u32) -> Self {
        Self { iterations }
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derive a key from a password, generating a salt if none is given.
///
/// # Postconditions
/// - Returns the derived key and the salt that produced it
/// - The key is deterministic given the same password, salt and params
///
/// # Errors
/// - Returns error if `params.iterations` is zero
///
/// # Security
/// - Password is not stored or logged
/// - An empty password is accepted; length policy belongs to the caller
pub fn derive_key(
    password: &[u8],
    salt: Option<&Salt>,
    params: &KdfParams,
) -> Result<(DerivedKey, Salt)> {
    if params.iterations == 0 {
        return Err(Error::InvalidInput(
            "KDF iteration count must be non-zero".to_string(),
        ));
    }

    let salt = salt.copied().unwrap_or_else(Salt::generate);

    let mut key_bytes = Zeroizing::new([0u8; KEY_LENGTH]);
    pbkdf2::pbkdf2::<Hmac<Sha256>>(
        password,
        salt.as_bytes(),
        params.iterations,
        key_bytes.as_mut_slice(),
    )
    .map_err(|e| Error::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok((DerivedKey::from_bytes(*key_bytes), salt))
}

/// Derive a key with the default iteration count.
pub fn derive(password: &[u8], salt: Option<&Salt>) -> Result<(DerivedKey, Salt)> {
    derive_key(password, salt, &KdfParams::default())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast() -> KdfParams {
        KdfParams::with_iterations(1_000)
    }

    #[test]
    fn test_derive_key_deterministic() {
        let password = b"test-password-123";
        let salt = Salt::from_bytes([42u8; 16]);

        let (key1, salt1) = derive(password, Some(&salt)).unwrap();
        let (key2, salt2) = derive(password, Some(&salt)).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
        assert_eq!(salt1, salt);
        assert_eq!(salt2, salt);
    }

    #[test]
    fn test_derive_key_generates_salt() {
        let (key1, salt1) = derive_key(b"password", None, &fast()).unwrap();
        let (key2, salt2) = derive_key(b"password", None, &fast()).unwrap();

        assert_ne!(salt1, salt2);
        assert_ne!(key1.as_bytes(), key2.as_bytes());

        let (again, _) = derive_key(b"password", Some(&salt1), &fast()).unwrap();
        assert_eq!(again.as_bytes(), key1.as_bytes());
    }

    #[test]
    fn test_derive_key_different_salt() {
        let salt1 = Salt::from_bytes([1u8; 16]);
        let salt2 = Salt::from_bytes([2u8; 16]);

        let (key1, _) = derive_key(b"pw", Some(&salt1), &fast()).unwrap();
        let (key2, _) = derive_key(b"pw", Some(&salt2), &fast()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_different_password() {
        let salt = Salt::from_bytes([42u8; 16]);

        let (key1, _) = derive_key(b"password1", Some(&salt), &fast()).unwrap();
        let (key2, _) = derive_key(b"password2", Some(&salt), &fast()).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_derive_key_iterations_matter() {
        let salt = Salt::from_bytes([9u8; 16]);

        let (key1, _) = derive_key(b"pw", Some(&salt), &KdfParams::with_iterations(1)).unwrap();
        let (key2, _) = derive_key(b"pw", Some(&salt), &KdfParams::with_iterations(2)).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_empty_password_is_accepted() {
        let salt = Salt::from_bytes([3u8; 16]);
        let (key1, _) = derive_key(b"", Some(&salt), &fast()).unwrap();
        let (key2, _) = derive_key(b"", Some(&salt), &fast()).unwrap();
        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let result = derive_key(b"pw", None, &KdfParams::with_iterations(0));
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_default_params() {
        assert_eq!(KdfParams::default().iterations, 100_000);
    }
}
