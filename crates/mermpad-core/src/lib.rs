//! Data model for mermpad diagrams.
//!
//! Defines the persisted [`DiagramRecord`], the [`DiagramPatch`] used for
//! partial updates, the [`DiagramId`] identity newtype and [`CoreError`].

pub mod error;
pub mod id;
pub mod record;

// Re-export commonly used types
pub use error::CoreError;
pub use id::DiagramId;
pub use record::{DiagramName, DiagramPatch, DiagramRecord, Timestamp, DEFAULT_ZOOM_PERCENT};
