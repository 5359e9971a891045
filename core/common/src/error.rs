//! Common error types for FileVault.

use thiserror::Error;

/// Top-level error type for FileVault operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Empty or malformed arguments (salt/IV length, file name, password).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Ciphertext is too short to carry a padding byte, or the padding
    /// byte asks to strip more bytes than were decrypted.
    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// The block cipher rejected the ciphertext.
    #[error("Decryption failed: {0}")]
    DecryptionFailure(String),

    /// Integrity tag did not match: wrong password or tampered data.
    #[error("Integrity check failed")]
    IntegrityFailure,

    /// Other cryptographic failure (key derivation, cipher setup).
    #[error("Cryptographic error: {0}")]
    Crypto(String),

    /// Storage operation failed.
    #[error("Storage error: {0}")]
    Storage(String),

    /// I/O operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization or deserialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Operation not permitted.
    #[error("Not permitted: {0}")]
    NotPermitted(String),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Resource already exists.
    #[error("Already exists: {0}")]
    AlreadyExists(String),
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

/// Result type alias using the common Error.
pub type Result<T> = std::result::Result<T, Error>;
