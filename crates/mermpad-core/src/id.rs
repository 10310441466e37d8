//! Stable identifier newtype for persisted diagrams.
//!
//! [`DiagramId`] wraps a v4 UUID. Identity is assigned by the store when a
//! record is created and never changes afterwards, so nothing outside the
//! storage layer should mint one except by parsing an existing reference.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;

/// Unique identifier of a stored diagram.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DiagramId(pub Uuid);

impl DiagramId {
    /// Allocates a fresh random identifier.
    pub fn generate() -> Self {
        DiagramId(Uuid::new_v4())
    }

    /// Parses an externally supplied reference token.
    ///
    /// Surrounding whitespace is ignored; anything that is not a UUID is
    /// rejected with [`CoreError::InvalidId`].
    pub fn parse(token: &str) -> Result<Self, CoreError> {
        Uuid::parse_str(token.trim())
            .map(DiagramId)
            .map_err(|_| CoreError::InvalidId {
                token: token.to_string(),
            })
    }
}

impl fmt::Display for DiagramId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

impl FromStr for DiagramId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DiagramId::parse(s)
    }
}
