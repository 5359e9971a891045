//! Vault engine for FileVault.
//!
//! This module provides:
//! - Vault settings and their persistence
//! - File records holding the salt and IV each blob needs
//! - The metadata index, stored alongside the blobs
//! - Upload, download and delete flows over any storage provider
//!
//! # Architecture
//! The vault sits between the user interface and storage providers. It
//! derives a fresh key per file from the caller's password and never keeps
//! key material between calls.

pub mod config;
pub mod index;
pub mod operations;
pub mod record;

pub use config::{VaultSettings, BLOB_DIRNAME, INDEX_KEY, SETTINGS_FILENAME};
pub use index::FileIndex;
pub use operations::{DecryptedFile, FileVault, UploadRequest, Usage};
pub use record::{FileId, FileRecord, DEFAULT_CONTENT_TYPE};
