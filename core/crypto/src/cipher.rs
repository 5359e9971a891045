//! Password-based AES-256-CBC encryption.
//!
//! Each call derives a fresh key from the password, so no key state is held
//! between calls. The output format is raw ciphertext; the salt and IV are
//! returned separately and must be stored alongside it.

use aes::Aes256;
use cbc::cipher::{block_padding::NoPadding, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use zeroize::Zeroizing;

use crate::kdf::{derive_key, KdfParams};
use crate::keys::{DerivedKey, Iv, Salt};
use crate::padding::{pad, unpad, BLOCK_SIZE};
use filevault_common::{Error, Result};

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

/// Ciphertext together with the public values needed to decrypt it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedData {
    /// Padded AES-256-CBC ciphertext.
    pub ciphertext: Vec<u8>,
    /// Salt the key was derived with.
    pub salt: Salt,
    /// CBC initialization vector.
    pub iv: Iv,
}

/// Encrypt plaintext under a password with the default KDF parameters.
///
/// # Postconditions
/// - Ciphertext length is a multiple of 16 and strictly greater than the
///   plaintext length
/// - Salt and IV are freshly generated
///
/// # Security
/// - The derived key is zeroized before returning
/// - No integrity protection; see [`crate::integrity`]
pub fn encrypt(plaintext: &[u8], password: &[u8]) -> Result<EncryptedData> {
    encrypt_with(plaintext, password, &KdfParams::default())
}

/// Encrypt plaintext under a password with explicit KDF parameters.
pub fn encrypt_with(plaintext: &[u8], password: &[u8], params: &KdfParams) -> Result<EncryptedData> {
    let (key, salt) = derive_key(password, None, params)?;
    let iv = Iv::generate();
    let ciphertext = encrypt_with_key(&key, &iv, plaintext)?;

    Ok(EncryptedData {
        ciphertext,
        salt,
        iv,
    })
}

/// Decrypt ciphertext with the default KDF parameters.
///
/// # Errors
/// - `InvalidInput` if salt or IV have the wrong length
/// - `MalformedCiphertext` if the ciphertext is empty or its padding byte
///   is larger than the decrypted buffer
/// - `DecryptionFailure` if the length is not a multiple of the block size
///
/// # Security
/// A wrong password usually returns garbage rather than an error. Success
/// does not prove the password was correct.
pub fn decrypt(ciphertext: &[u8], password: &[u8], salt: &[u8], iv: &[u8]) -> Result<Vec<u8>> {
    decrypt_with(
        ciphertext,
        password,
        &Salt::from_slice(salt)?,
        &Iv::from_slice(iv)?,
        &KdfParams::default(),
    )
}

/// Decrypt ciphertext with explicit KDF parameters.
pub fn decrypt_with(
    ciphertext: &[u8],
    password: &[u8],
    salt: &Salt,
    iv: &Iv,
    params: &KdfParams,
) -> Result<Vec<u8>> {
    check_ciphertext_shape(ciphertext)?;
    let (key, _) = derive_key(password, Some(salt), params)?;
    decrypt_with_key(&key, iv, ciphertext)
}

/// Reject ciphertexts that cannot be valid before spending time on the KDF.
pub(crate) fn check_ciphertext_shape(ciphertext: &[u8]) -> Result<()> {
    if ciphertext.is_empty() {
        return Err(Error::MalformedCiphertext(
            "Ciphertext is empty".to_string(),
        ));
    }
    if ciphertext.len() % BLOCK_SIZE != 0 {
        return Err(Error::DecryptionFailure(format!(
            "Ciphertext length {} is not a multiple of {}",
            ciphertext.len(),
            BLOCK_SIZE
        )));
    }
    Ok(())
}

pub(crate) fn encrypt_with_key(key: &DerivedKey, iv: &Iv, plaintext: &[u8]) -> Result<Vec<u8>> {
    let encryptor = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv.as_bytes())
        .map_err(|e| Error::Crypto(format!("Cipher setup failed: {}", e)))?;
    let padded = Zeroizing::new(pad(plaintext));
    Ok(encryptor.encrypt_padded_vec_mut::<NoPadding>(&padded))
}

pub(crate) fn decrypt_with_key(key: &DerivedKey, iv: &Iv, ciphertext: &[u8]) -> Result<Vec<u8>> {
    check_ciphertext_shape(ciphertext)?;
    let decryptor = Aes256CbcDec::new_from_slices(key.as_bytes(), iv.as_bytes())
        .map_err(|e| Error::Crypto(format!("Cipher setup failed: {}", e)))?;
    let padded = decryptor
        .decrypt_padded_vec_mut::<NoPadding>(ciphertext)
        .map_err(|e| Error::DecryptionFailure(e.to_string()))?;
    unpad(padded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::{IV_LENGTH, KEY_LENGTH, SALT_LENGTH};
    use proptest::prelude::*;

    fn fast() -> KdfParams {
        KdfParams::with_iterations(1_000)
    }

    #[test]
    fn test_hello_world_scenario() {
        let encrypted = encrypt(b"hello world", b"secret").unwrap();
        assert_eq!(encrypted.ciphertext.len(), 16);

        let decrypted = decrypt(
            &encrypted.ciphertext,
            b"secret",
            encrypted.salt.as_bytes(),
            encrypted.iv.as_bytes(),
        )
        .unwrap();
        assert_eq!(decrypted, b"hello world");
    }

    #[test]
    fn test_block_aligned_input_gets_extra_block() {
        let encrypted = encrypt(b"0123456789abcdef", b"secret").unwrap();
        assert_eq!(encrypted.ciphertext.len(), 32);
    }

    #[test]
    fn test_empty_plaintext() {
        let encrypted = encrypt_with(b"", b"pw", &fast()).unwrap();
        assert_eq!(encrypted.ciphertext.len(), 16);

        let decrypted =
            decrypt_with(&encrypted.ciphertext, b"pw", &encrypted.salt, &encrypted.iv, &fast())
                .unwrap();
        assert!(decrypted.is_empty());
    }

    #[test]
    fn test_empty_password_roundtrip() {
        let encrypted = encrypt_with(b"data", b"", &fast()).unwrap();
        let decrypted =
            decrypt_with(&encrypted.ciphertext, b"", &encrypted.salt, &encrypted.iv, &fast())
                .unwrap();
        assert_eq!(decrypted, b"data");
    }

    #[test]
    fn test_fresh_salt_and_iv_each_time() {
        let a = encrypt_with(b"same plaintext", b"pw", &fast()).unwrap();
        let b = encrypt_with(b"same plaintext", b"pw", &fast()).unwrap();

        assert_ne!(a.salt, b.salt);
        assert_ne!(a.iv, b.iv);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn test_known_answer_with_fixed_key() {
        // NIST SP 800-38A F.2.5, CBC-AES256 first block.
        let key = DerivedKey::from_bytes([
            0x60, 0x3d, 0xeb, 0x10, 0x15, 0xca, 0x71, 0xbe, 0x2b, 0x73, 0xae, 0xf0, 0x85, 0x7d,
            0x77, 0x81, 0x1f, 0x35, 0x2c, 0x07, 0x3b, 0x61, 0x08, 0xd7, 0x2d, 0x98, 0x10, 0xa3,
            0x09, 0x14, 0xdf, 0xf4,
        ]);
        let iv = Iv::from_bytes([
            0x00, 0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08, 0x09, 0x0a, 0x0b, 0x0c, 0x0d,
            0x0e, 0x0f,
        ]);
        let block = [
            0x6b, 0xc1, 0xbe, 0xe2, 0x2e, 0x40, 0x9f, 0x96, 0xe9, 0x3d, 0x7e, 0x11, 0x73, 0x93,
            0x17, 0x2a,
        ];

        let ciphertext = encrypt_with_key(&key, &iv, &block).unwrap();
        assert_eq!(ciphertext.len(), 32);
        assert_eq!(
            ciphertext[..16],
            [
                0xf5, 0x8c, 0x4c, 0x04, 0xd6, 0xe5, 0xf1, 0xba, 0x77, 0x9e, 0xab, 0xfb, 0x5f,
                0x7b, 0xfb, 0xd6
            ]
        );
        assert_eq!(decrypt_with_key(&key, &iv, &ciphertext).unwrap(), block);
    }

    #[test]
    fn test_wrong_password_never_returns_plaintext() {
        let plaintext = b"Secret data that must stay secret";
        let encrypted = encrypt_with(plaintext, b"right", &fast()).unwrap();

        let result =
            decrypt_with(&encrypted.ciphertext, b"wrong", &encrypted.salt, &encrypted.iv, &fast());

        match result {
            Ok(garbage) => assert_ne!(garbage, plaintext),
            Err(e) => assert!(matches!(e, Error::MalformedCiphertext(_))),
        }
    }

    #[test]
    fn test_short_ciphertext_fails() {
        let salt = [0u8; SALT_LENGTH];
        let iv = [0u8; IV_LENGTH];

        assert!(matches!(
            decrypt(b"", b"pw", &salt, &iv),
            Err(Error::MalformedCiphertext(_))
        ));
        assert!(matches!(
            decrypt(&[0u8; 7], b"pw", &salt, &iv),
            Err(Error::DecryptionFailure(_))
        ));
        assert!(matches!(
            decrypt(&[0u8; 17], b"pw", &salt, &iv),
            Err(Error::DecryptionFailure(_))
        ));
    }

    #[test]
    fn test_bad_salt_or_iv_length() {
        let ct = [0u8; 16];
        assert!(matches!(
            decrypt(&ct, b"pw", &[0u8; 8], &[0u8; IV_LENGTH]),
            Err(Error::InvalidInput(_))
        ));
        assert!(matches!(
            decrypt(&ct, b"pw", &[0u8; SALT_LENGTH], &[0u8; 15]),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_overlong_padding_is_malformed() {
        // Build a block whose plaintext ends in 0xFF so unpadding must fail.
        let key = DerivedKey::from_bytes([5u8; KEY_LENGTH]);
        let iv = Iv::from_bytes([6u8; IV_LENGTH]);
        let encryptor = Aes256CbcEnc::new_from_slices(key.as_bytes(), iv.as_bytes()).unwrap();
        let ciphertext = encryptor.encrypt_padded_vec_mut::<NoPadding>(&[0xFFu8; 16]);

        assert!(matches!(
            decrypt_with_key(&key, &iv, &ciphertext),
            Err(Error::MalformedCiphertext(_))
        ));
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn roundtrip_any_plaintext(
            plaintext in proptest::collection::vec(any::<u8>(), 0..300),
            password in proptest::collection::vec(any::<u8>(), 0..24),
        ) {
            let params = KdfParams::with_iterations(10);
            let encrypted = encrypt_with(&plaintext, &password, &params).unwrap();

            prop_assert_eq!(encrypted.ciphertext.len() % BLOCK_SIZE, 0);
            prop_assert!(encrypted.ciphertext.len() > plaintext.len());

            let decrypted = decrypt_with(
                &encrypted.ciphertext,
                &password,
                &encrypted.salt,
                &encrypted.iv,
                &params,
            ).unwrap();
            prop_assert_eq!(decrypted, plaintext);
        }

        #[test]
        fn garbage_never_panics(
            ciphertext in proptest::collection::vec(any::<u8>(), 0..80),
        ) {
            let params = KdfParams::with_iterations(1);
            let salt = Salt::from_bytes([1u8; SALT_LENGTH]);
            let iv = Iv::from_bytes([2u8; IV_LENGTH]);
            let _ = decrypt_with(&ciphertext, b"pw", &salt, &iv, &params);
        }
    }
}
