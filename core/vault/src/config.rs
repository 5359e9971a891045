//! Vault settings.

use serde::{Deserialize, Serialize};
use std::path::Path;

use filevault_common::{Error, Result, StorageKey};
use filevault_crypto::{KdfParams, DEFAULT_ITERATIONS};

/// Settings file name in the vault directory.
pub const SETTINGS_FILENAME: &str = "filevault.json";

/// Blob directory name in the vault directory (local provider).
pub const BLOB_DIRNAME: &str = "blobs";

/// Storage key of the metadata index.
///
/// Generated blob keys always start with hex digits, so this never collides.
pub const INDEX_KEY: &str = "_index.json";

/// Settings a [`FileVault`](crate::FileVault) is constructed from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VaultSettings {
    /// Storage provider type (e.g., "local", "memory").
    pub provider_type: String,
    /// Provider-specific configuration.
    #[serde(default)]
    pub provider_config: serde_json::Value,
    /// PBKDF2 iterations for newly uploaded files.
    #[serde(default = "default_iterations")]
    pub kdf_iterations: u32,
    /// Tag new uploads with an HMAC so wrong passwords and tampering are
    /// detected. Off by default to keep the plain CBC format.
    #[serde(default)]
    pub integrity: bool,
}

fn default_iterations() -> u32 {
    DEFAULT_ITERATIONS
}

impl VaultSettings {
    /// Settings for a local vault rooted at `root`, with blobs stored in
    /// `root/blobs`.
    pub fn local(root: impl AsRef<Path>) -> Self {
        let blobs = root.as_ref().join(BLOB_DIRNAME);
        Self {
            provider_type: "local".to_string(),
            provider_config: serde_json::json!({ "root": blobs }),
            kdf_iterations: DEFAULT_ITERATIONS,
            integrity: false,
        }
    }

    /// Settings for an in-memory vault.
    pub fn memory() -> Self {
        Self {
            provider_type: "memory".to_string(),
            provider_config: serde_json::Value::Null,
            kdf_iterations: DEFAULT_ITERATIONS,
            integrity: false,
        }
    }

    /// Enable or disable integrity tags for new uploads.
    pub fn with_integrity(mut self, integrity: bool) -> Self {
        self.integrity = integrity;
        self
    }

    /// Override the KDF iteration count for new uploads.
    pub fn with_iterations(mut self, iterations: u32) -> Self {
        self.kdf_iterations = iterations;
        self
    }

    /// KDF parameters for new uploads.
    pub fn kdf_params(&self) -> KdfParams {
        KdfParams::with_iterations(self.kdf_iterations)
    }

    /// Check the settings are usable.
    ///
    /// # Errors
    /// - Empty provider type
    /// - Zero KDF iterations
    pub fn validate(&self) -> Result<()> {
        if self.provider_type.is_empty() {
            return Err(Error::InvalidInput(
                "Provider type cannot be empty".to_string(),
            ));
        }
        if self.kdf_iterations == 0 {
            return Err(Error::InvalidInput(
                "KDF iteration count must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Serialize settings to JSON.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Deserialize settings from JSON.
    pub fn from_json(json: &str) -> Result<Self> {
        let settings: Self = serde_json::from_str(json)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a file.
    ///
    /// # Errors
    /// - `NotFound` if the file does not exist
    /// - Invalid JSON or invalid values
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = match tokio::fs::read_to_string(path).await {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::NotFound(format!(
                    "Settings not found: {}",
                    path.display()
                )))
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&json)
    }

    /// Write settings to a file, creating parent directories.
    pub async fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, self.to_json()?).await?;
        Ok(())
    }
}

/// Storage key of the metadata index.
pub(crate) fn index_key() -> Result<StorageKey> {
    StorageKey::new(INDEX_KEY)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_local_settings() {
        let settings = VaultSettings::local("/srv/vault");
        assert_eq!(settings.provider_type, "local");
        assert_eq!(
            settings.provider_config["root"].as_str().unwrap(),
            Path::new("/srv/vault").join("blobs").to_str().unwrap()
        );
        assert_eq!(settings.kdf_iterations, 100_000);
        assert!(!settings.integrity);
    }

    #[test]
    fn test_defaults_fill_missing_fields() {
        let settings = VaultSettings::from_json(r#"{"provider_type": "memory"}"#).unwrap();
        assert_eq!(settings, VaultSettings::memory());
    }

    #[test]
    fn test_zero_iterations_rejected() {
        let json = r#"{"provider_type": "memory", "kdf_iterations": 0}"#;
        assert!(matches!(
            VaultSettings::from_json(json),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn test_index_key_is_not_a_generated_key() {
        let key = index_key().unwrap();
        assert!(!key.as_str().starts_with(|c: char| c.is_ascii_hexdigit()));
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("nested").join(SETTINGS_FILENAME);
        let settings = VaultSettings::local(temp.path())
            .with_integrity(true)
            .with_iterations(5_000);

        settings.save(&path).await.unwrap();
        let loaded = VaultSettings::load(&path).await.unwrap();

        assert_eq!(loaded, settings);
    }

    #[tokio::test]
    async fn test_load_missing() {
        let temp = TempDir::new().unwrap();
        let result = VaultSettings::load(temp.path().join(SETTINGS_FILENAME)).await;
        assert!(matches!(result, Err(Error::NotFound(_))));
    }
}
