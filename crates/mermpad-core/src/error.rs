//! Core error types for mermpad-core.
//!
//! Uses `thiserror` for structured, matchable variants covering validation
//! failures in the diagram data model.

use thiserror::Error;

/// Core errors produced by the mermpad-core crate.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CoreError {
    /// A reference token could not be parsed as a diagram identifier.
    #[error("invalid diagram id: '{token}'")]
    InvalidId { token: String },

    /// A diagram name was empty after trimming.
    #[error("diagram name must not be empty")]
    EmptyName,
}
