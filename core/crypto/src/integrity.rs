//! Encrypt-then-MAC on top of the CBC cipher.
//!
//! The ciphertext bytes are exactly what [`crate::cipher`] produces; the
//! HMAC-SHA256 tag over `salt || iv || ciphertext` is stored beside them.
//! Opening verifies the tag before any decryption, so a wrong password or a
//! modified blob fails with `IntegrityFailure` instead of returning garbage.

use hmac::{Hmac, Mac};
use sha2::Sha256;
use zeroize::Zeroizing;

use crate::cipher::{check_ciphertext_shape, decrypt_with_key, encrypt_with_key, EncryptedData};
use crate::kdf::{derive_key, KdfParams};
use crate::keys::{DerivedKey, Iv, Salt};
use filevault_common::{Error, Result};

type HmacSha256 = Hmac<Sha256>;

/// Length of the integrity tag in bytes.
pub const TAG_LENGTH: usize = 32;

/// Domain label for the MAC subkey.
const MAC_KEY_LABEL: &[u8] = b"filevault/integrity/v1";

/// Encrypted data plus its integrity tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedData {
    /// Ciphertext, salt and IV, identical in layout to unsealed output.
    pub data: EncryptedData,
    /// HMAC-SHA256 tag.
    pub tag: [u8; TAG_LENGTH],
}

/// Encrypt and tag plaintext under a password.
pub fn seal(plaintext: &[u8], password: &[u8], params: &KdfParams) -> Result<SealedData> {
    let (key, salt) = derive_key(password, None, params)?;
    let iv = Iv::generate();
    let ciphertext = encrypt_with_key(&key, &iv, plaintext)?;
    let tag = compute_tag(&key, &salt, &iv, &ciphertext)?;

    Ok(SealedData {
        data: EncryptedData {
            ciphertext,
            salt,
            iv,
        },
        tag,
    })
}

/// Verify the tag, then decrypt.
///
/// # Errors
/// - `InvalidInput` if the tag has the wrong length
/// - `IntegrityFailure` on a wrong password or any modified input
/// - Any error [`crate::cipher::decrypt_with`] can return
pub fn open(
    ciphertext: &[u8],
    password: &[u8],
    salt: &Salt,
    iv: &Iv,
    tag: &[u8],
    params: &KdfParams,
) -> Result<Vec<u8>> {
    if tag.len() != TAG_LENGTH {
        return Err(Error::InvalidInput(format!(
            "Integrity tag must be {} bytes, got {}",
            TAG_LENGTH,
            tag.len()
        )));
    }
    check_ciphertext_shape(ciphertext)?;

    let (key, _) = derive_key(password, Some(salt), params)?;
    mac_for(&key, salt, iv, ciphertext)?
        .verify_slice(tag)
        .map_err(|_| Error::IntegrityFailure)?;

    decrypt_with_key(&key, iv, ciphertext)
}

fn compute_tag(key: &DerivedKey, salt: &Salt, iv: &Iv, ciphertext: &[u8]) -> Result<[u8; TAG_LENGTH]> {
    let result = mac_for(key, salt, iv, ciphertext)?.finalize().into_bytes();
    let mut tag = [0u8; TAG_LENGTH];
    tag.copy_from_slice(&result);
    Ok(tag)
}

fn mac_for(key: &DerivedKey, salt: &Salt, iv: &Iv, ciphertext: &[u8]) -> Result<HmacSha256> {
    let mac_key = mac_subkey(key)?;
    let mut mac = <HmacSha256 as Mac>::new_from_slice(mac_key.as_slice())
        .map_err(|e| Error::Crypto(format!("MAC setup failed: {}", e)))?;
    mac.update(salt.as_bytes());
    mac.update(iv.as_bytes());
    mac.update(ciphertext);
    Ok(mac)
}

/// MAC key, derived from the cipher key under a fixed label.
fn mac_subkey(key: &DerivedKey) -> Result<Zeroizing<Vec<u8>>> {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(key.as_bytes())
        .map_err(|e| Error::Crypto(format!("MAC setup failed: {}", e)))?;
    mac.update(MAC_KEY_LABEL);
    Ok(Zeroizing::new(mac.finalize().into_bytes().to_vec()))
}
