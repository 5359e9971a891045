//! Blob storage for FileVault.
//!
//! Ciphertext blobs are opaque byte sequences stored under a generated
//! [`StorageKey`](filevault_common::StorageKey). This crate provides the
//! provider trait, a local filesystem backend whose root directory is passed
//! in explicitly, an in-memory backend for tests, and a registry that builds
//! providers from JSON configuration.

pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;

pub use local::LocalProvider;
pub use memory::MemoryProvider;
pub use provider::{BlobMetadata, StorageProvider};
pub use registry::{create_default_registry, ProviderFactory, ProviderRegistry};
