//! Error types for the credential cache.
//!
//! This module defines the error types used throughout the wxbroker-cache crate.

use thiserror::Error;

/// Result type alias for cache operations.
pub type CacheResult<T> = std::result::Result<T, CacheError>;

/// Errors that can occur during cache operations.
///
/// Cloneable so that a single failure can be handed to every caller waiting
/// on the same credential.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CacheError {
    /// The backing store rejected the operation.
    #[error("Cache backend error: {0}")]
    Backend(String),

    /// A lock was poisoned by a panicking holder.
    #[error("Lock poisoned: {0}")]
    LockPoisoned(String),

    /// A cached entry could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl CacheError {
    /// Create a backend error.
    pub fn backend(msg: impl Into<String>) -> Self {
        Self::Backend(msg.into())
    }

    /// Create a lock poisoned error.
    pub fn lock_poisoned(msg: impl Into<String>) -> Self {
        Self::LockPoisoned(msg.into())
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for CacheError {
    fn from(err: std::io::Error) -> Self {
        Self::Backend(err.to_string())
    }
}
