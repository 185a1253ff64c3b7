//! Error types for crabykv
//!
//! Provides a unified error type for all operations.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias using KvError
pub type Result<T> = std::result::Result<T, KvError>;

/// Unified error type for crabykv operations
#[derive(Debug, Error)]
pub enum KvError {
    // -------------------------------------------------------------------------
    // Lifecycle Errors
    // -------------------------------------------------------------------------
    #[error("Failed to open store at {}: {reason}", path.display())]
    StoreOpen { path: PathBuf, reason: String },

    #[error("Store is not initialized")]
    NotInitialized,

    // -------------------------------------------------------------------------
    // Persistence Errors
    // -------------------------------------------------------------------------
    #[error("Persistence error: {0}")]
    Persistence(#[from] std::io::Error),

    // -------------------------------------------------------------------------
    // Codec Errors
    // -------------------------------------------------------------------------
    #[error("Corrupt record: {reason}")]
    CorruptRecord { reason: String },

    #[error("Incomplete record: need {needed} bytes, have {available}")]
    Incomplete { needed: usize, available: usize },

    #[error("Record too large: {size} bytes (max {max})")]
    RecordTooLarge { size: usize, max: usize },

    #[error("Serialization error: {0}")]
    Serialization(String),

    // -------------------------------------------------------------------------
    // Caller Errors
    // -------------------------------------------------------------------------
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl KvError {
    /// Build a `StoreOpen` error for `path`
    pub(crate) fn open(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        KvError::StoreOpen {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Build a `CorruptRecord` error
    pub(crate) fn corrupt(reason: impl Into<String>) -> Self {
        KvError::CorruptRecord {
            reason: reason.into(),
        }
    }

    /// True for the decode failures that recovery treats as end-of-log
    pub fn is_recoverable_decode(&self) -> bool {
        matches!(
            self,
            KvError::CorruptRecord { .. } | KvError::Incomplete { .. }
        )
    }
}
