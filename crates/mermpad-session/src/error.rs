//! Session error types.
//!
//! [`SessionError`] is returned by explicit user actions (create, save,
//! rename, delete, ...). Background work such as autosave never returns
//! it; failures there are logged and published as status instead.

use mermpad_core::CoreError;
use mermpad_storage::StorageError;

/// Errors surfaced to the user by explicit editor actions.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The underlying store rejected the operation.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Input failed validation (e.g. a blank diagram name).
    #[error(transparent)]
    Invalid(#[from] CoreError),

    /// Configuration could not be parsed.
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl SessionError {
    /// True if the action targeted a diagram that no longer exists.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SessionError::Storage(StorageError::NotFound(_)))
    }
}
