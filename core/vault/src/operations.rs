//! Encrypted file operations.
//!
//! [`FileVault`] ties the cipher engine to a storage provider and the
//! metadata index. It implements the three caller flows: upload encrypts and
//! stores, download fetches and decrypts, delete confirms the password and
//! removes blob and record.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

use crate::config::{index_key, VaultSettings};
use crate::index::FileIndex;
use crate::record::{FileId, FileRecord, DEFAULT_CONTENT_TYPE};
use filevault_common::{Error, Result, SensitiveBytes, StorageKey};
use filevault_crypto::{decrypt_with, encrypt_with, open, seal, EncryptedData};
use filevault_storage::{ProviderRegistry, StorageProvider};

/// A file to upload.
#[derive(Clone)]
pub struct UploadRequest {
    /// Original file name, kept for download.
    pub name: String,
    /// Declared content type; empty means `application/octet-stream`.
    pub content_type: String,
    /// Plaintext bytes.
    pub data: Vec<u8>,
}

impl UploadRequest {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            data,
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = content_type.into();
        self
    }
}

/// A decrypted file ready to hand back to the user.
#[derive(Debug)]
pub struct DecryptedFile {
    pub record: FileRecord,
    pub data: SensitiveBytes,
}

/// Per-owner storage totals.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub files: usize,
    /// Sum of plaintext sizes in bytes.
    pub total_size: u64,
}

/// Encrypted file vault.
///
/// Holds no key material: every call derives its key from the password it
/// is given and drops it before returning.
pub struct FileVault {
    settings: VaultSettings,
    provider: Arc<dyn StorageProvider>,
    index: RwLock<FileIndex>,
}

impl FileVault {
    /// Open a vault, resolving its provider from the registry.
    ///
    /// # Errors
    /// - Invalid settings
    /// - Provider not registered or misconfigured
    /// - Index unreadable
    pub async fn open(settings: VaultSettings, registry: &ProviderRegistry) -> Result<Self> {
        settings.validate()?;
        let provider =
            registry.resolve(&settings.provider_type, settings.provider_config.clone())?;
        Self::with_provider(settings, provider).await
    }

    /// Open a vault on an existing provider.
    ///
    /// # Postconditions
    /// - The index is loaded, or empty if the provider holds none yet
    pub async fn with_provider(
        settings: VaultSettings,
        provider: Arc<dyn StorageProvider>,
    ) -> Result<Self> {
        settings.validate()?;

        let key = index_key()?;
        let index = if provider.exists(&key).await? {
            FileIndex::from_bytes(&provider.get(&key).await?)?
        } else {
            FileIndex::new()
        };

        debug!(provider = provider.name(), files = index.len(), "Vault opened");

        Ok(Self {
            settings,
            provider,
            index: RwLock::new(index),
        })
    }

    /// Get the vault settings.
    pub fn settings(&self) -> &VaultSettings {
        &self.settings
    }

    /// Get the storage provider.
    pub fn provider(&self) -> Arc<dyn StorageProvider> {
        self.provider.clone()
    }

    /// Encrypt and store a file.
    ///
    /// # Postconditions
    /// - Ciphertext is stored under a freshly generated key
    /// - The record (with salt, IV and optional tag) is persisted in the index
    ///
    /// # Errors
    /// - `InvalidInput` for an empty owner, file name or password
    /// - Storage failure; the blob is removed again if the index cannot be saved
    pub async fn upload(
        &self,
        owner: &str,
        request: UploadRequest,
        password: &[u8],
    ) -> Result<FileRecord> {
        if owner.is_empty() {
            return Err(Error::InvalidInput("Owner cannot be empty".to_string()));
        }
        if request.name.is_empty() {
            return Err(Error::InvalidInput("File name cannot be empty".to_string()));
        }
        if password.is_empty() {
            return Err(Error::InvalidInput("Password cannot be empty".to_string()));
        }

        let size = request.data.len() as u64;
        debug!(owner, name = %request.name, size, "Encrypting upload");

        let params = self.settings.kdf_params();
        let integrity = self.settings.integrity;
        let password = Zeroizing::new(password.to_vec());
        let plaintext = Zeroizing::new(request.data);

        let (encrypted, tag) = run_blocking(move || {
            if integrity {
                let sealed = seal(&plaintext, &password, &params)?;
                Ok((sealed.data, Some(sealed.tag)))
            } else {
                Ok((encrypt_with(&plaintext, &password, &params)?, None))
            }
        })
        .await?;

        let EncryptedData {
            ciphertext,
            salt,
            iv,
        } = encrypted;

        let storage_key = StorageKey::generate(&request.name);
        self.provider.put(&storage_key, ciphertext).await?;

        let now = Utc::now();
        let content_type = if request.content_type.is_empty() {
            DEFAULT_CONTENT_TYPE.to_string()
        } else {
            request.content_type
        };
        let record = FileRecord {
            id: FileId::new(),
            owner: owner.to_string(),
            original_name: request.name,
            content_type,
            size,
            storage_key,
            salt,
            iv,
            tag,
            kdf_iterations: params.iterations,
            created_at: now,
            updated_at: now,
        };

        self.commit_upload(&record).await?;

        info!(owner, id = %record.id, size, sealed = record.is_sealed(), "File uploaded");
        Ok(record)
    }

    /// Fetch and decrypt a file.
    ///
    /// # Errors
    /// - `NotFound` if the owner has no such file
    /// - `IntegrityFailure` on a wrong password for a tagged record
    /// - `MalformedCiphertext` / `DecryptionFailure` from the cipher
    ///
    /// # Security
    /// For untagged records a wrong password usually returns garbage bytes
    /// rather than an error. Success does not prove the password was right.
    pub async fn download(&self, owner: &str, id: &FileId, password: &[u8]) -> Result<DecryptedFile> {
        let record = self.get(owner, id).await?;
        debug!(owner, id = %id, "Decrypting download");

        let ciphertext = self.provider.get(&record.storage_key).await?;
        let data = decrypt_record(&record, ciphertext, password).await?;

        info!(owner, id = %id, size = data.len(), "File downloaded");
        Ok(DecryptedFile { record, data })
    }

    /// Delete a file after confirming the password.
    ///
    /// The password is confirmed by attempting decryption. For untagged
    /// records that only catches malformed results, not every wrong password.
    ///
    /// # Errors
    /// - `NotFound` if the owner has no such file
    /// - `NotPermitted` if decryption with `password` fails
    pub async fn delete(&self, owner: &str, id: &FileId, password: &[u8]) -> Result<()> {
        let record = self.get(owner, id).await?;
        debug!(owner, id = %id, "Deleting file");

        match self.provider.get(&record.storage_key).await {
            Ok(ciphertext) => {
                decrypt_record(&record, ciphertext, password)
                    .await
                    .map_err(|e| match e {
                        Error::IntegrityFailure
                        | Error::MalformedCiphertext(_)
                        | Error::DecryptionFailure(_) => {
                            Error::NotPermitted("Password confirmation failed".to_string())
                        }
                        other => other,
                    })?;
            }
            Err(Error::NotFound(_)) => {
                warn!(id = %id, key = %record.storage_key, "Blob already missing, removing record");
            }
            Err(e) => return Err(e),
        }

        {
            let mut index = self.index.write().await;
            let removed = index.remove(id);
            if let Err(e) = self.persist_index(&index).await {
                if let Some(removed) = removed {
                    // Ids are unique, so re-inserting cannot collide.
                    let _ = index.insert(removed);
                }
                return Err(e);
            }
        }

        match self.provider.delete(&record.storage_key).await {
            Ok(()) | Err(Error::NotFound(_)) => {}
            Err(e) => {
                warn!(key = %record.storage_key, error = %e, "Record removed but blob deletion failed");
            }
        }

        info!(owner, id = %id, "File deleted");
        Ok(())
    }

    /// Look up one of the owner's records.
    pub async fn get(&self, owner: &str, id: &FileId) -> Result<FileRecord> {
        let index = self.index.read().await;
        index.get(owner, id).cloned()
    }

    /// The owner's records, newest first.
    pub async fn list(&self, owner: &str) -> Vec<FileRecord> {
        let index = self.index.read().await;
        index.for_owner(owner).into_iter().cloned().collect()
    }

    /// File count and total plaintext size for an owner.
    pub async fn usage(&self, owner: &str) -> Usage {
        let index = self.index.read().await;
        index
            .for_owner(owner)
            .iter()
            .fold(Usage::default(), |usage, record| Usage {
                files: usage.files + 1,
                total_size: usage.total_size + record.size,
            })
    }

    /// Index a freshly stored blob, removing the blob again on failure.
    async fn commit_upload(&self, record: &FileRecord) -> Result<()> {
        let result = {
            let mut index = self.index.write().await;
            self.insert_and_persist(&mut index, record.clone()).await
        };

        if result.is_err() {
            if let Err(cleanup) = self.provider.delete(&record.storage_key).await {
                warn!(key = %record.storage_key, error = %cleanup, "Failed to remove orphaned blob");
            }
        }
        result
    }

    async fn insert_and_persist(&self, index: &mut FileIndex, record: FileRecord) -> Result<()> {
        let id = record.id;
        index.insert(record)?;
        if let Err(e) = self.persist_index(index).await {
            index.remove(&id);
            return Err(e);
        }
        Ok(())
    }

    async fn persist_index(&self, index: &FileIndex) -> Result<()> {
        let bytes = index.to_bytes()?;
        self.provider.put(&index_key()?, bytes).await?;
        Ok(())
    }
}

/// Decrypt a record's blob off the async runtime.
async fn decrypt_record(
    record: &FileRecord,
    ciphertext: Vec<u8>,
    password: &[u8],
) -> Result<SensitiveBytes> {
    let password = Zeroizing::new(password.to_vec());
    let salt = record.salt;
    let iv = record.iv;
    let tag = record.tag;
    let params = record.kdf_params();

    let plaintext = run_blocking(move || match tag {
        Some(tag) => open(&ciphertext, &password, &salt, &iv, &tag, &params),
        None => decrypt_with(&ciphertext, &password, &salt, &iv, &params),
    })
    .await?;

    Ok(SensitiveBytes::new(plaintext))
}

/// Run CPU-bound key derivation and cipher work on the blocking pool.
async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| Error::Crypto(format!("Crypto task failed: {}", e)))?
}
