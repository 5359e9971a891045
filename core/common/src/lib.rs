//! Common utilities and types shared across FileVault modules.
//!
//! This module provides the error type used by every crate in the workspace
//! and the small value types that cross crate boundaries.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{SensitiveBytes, StorageKey};
