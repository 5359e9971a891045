//! Cryptographic core for FileVault.
//!
//! This module provides:
//! - Key derivation using PBKDF2-HMAC-SHA256
//! - AES-256-CBC encryption with PKCS#7 padding
//! - Optional encrypt-then-MAC integrity tags
//!
//! # Security Guarantees
//! - Derived keys are zeroized on drop and never returned to callers
//! - Every encryption uses a fresh random salt and IV
//! - No plaintext, password or key material is ever logged
//!
//! Plain CBC output carries no authentication: a wrong password usually
//! decrypts to garbage instead of failing. Use [`integrity`] when the
//! stored format allows an extra tag.

pub mod cipher;
pub mod integrity;
pub mod kdf;
pub mod keys;
pub mod padding;

pub use cipher::{decrypt, decrypt_with, encrypt, encrypt_with, EncryptedData};
pub use integrity::{open, seal, SealedData, TAG_LENGTH};
pub use kdf::{derive, derive_key, KdfParams, DEFAULT_ITERATIONS};
pub use keys::{DerivedKey, Iv, Salt, IV_LENGTH, KEY_LENGTH, SALT_LENGTH};
