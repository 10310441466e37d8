//! Storage error types for mermpad-storage.
//!
//! [`StorageError`] covers every failure mode a record backend can report:
//! lifecycle misuse, unknown records, backend faults on the read and write
//! paths, failed schema upgrades and serialization problems.

use mermpad_core::DiagramId;
use thiserror::Error;

/// Errors produced by storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// An operation was issued before `initialize()` completed.
    #[error("store used before initialize() completed")]
    NotInitialized,

    /// No record with the given id exists.
    #[error("diagram not found: {0}")]
    NotFound(DiagramId),

    /// The backend rejected a write (quota exceeded, store closed, ...).
    #[error("write failed: {reason}")]
    WriteFailed { reason: String },

    /// The backend could not serve a read (corruption, store closed, ...).
    #[error("read failed: {reason}")]
    ReadFailed { reason: String },

    /// A schema upgrade step could not be applied.
    #[error("upgrade from schema v{from} to v{to} failed: {reason}")]
    Upgrade { from: u32, to: u32, reason: String },

    /// JSON serialization or deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub(crate) fn write(reason: impl Into<String>) -> Self {
        StorageError::WriteFailed {
            reason: reason.into(),
        }
    }

    pub(crate) fn read(reason: impl Into<String>) -> Self {
        StorageError::ReadFailed {
            reason: reason.into(),
        }
    }
}
