//! Storage-layer types: lookup paths, ordering and open reports.

use serde::{Deserialize, Serialize};

/// A secondary lookup path over the `diagrams` collection.
///
/// Every path is non-unique and exists only to make ordered listings cheap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RecordIndex {
    Name,
    CreatedAt,
    UpdatedAt,
}

impl RecordIndex {
    pub const ALL: [RecordIndex; 3] = [
        RecordIndex::Name,
        RecordIndex::CreatedAt,
        RecordIndex::UpdatedAt,
    ];

    /// Name of the lookup path as it appears in the persisted layout.
    pub fn key_path(self) -> &'static str {
        match self {
            RecordIndex::Name => "name",
            RecordIndex::CreatedAt => "createdAt",
            RecordIndex::UpdatedAt => "updatedAt",
        }
    }

    /// SQL column backing the lookup path.
    pub(crate) fn column(self) -> &'static str {
        match self {
            RecordIndex::Name => "name",
            RecordIndex::CreatedAt => "created_at",
            RecordIndex::UpdatedAt => "updated_at",
        }
    }
}

/// Ordering direction for [`RecordIndex`] listings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Ascending,
    Descending,
}

/// What happened when a backend was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenReport {
    /// Schema version found on disk (0 if the store did not exist).
    pub previous_version: u32,
    /// Schema version after all upgrade steps ran.
    pub current_version: u32,
    /// True if the store was created by this open.
    pub created: bool,
}

impl OpenReport {
    /// True if at least one upgrade step ran over pre-existing data.
    pub fn upgraded(&self) -> bool {
        !self.created && self.previous_version < self.current_version
    }
}
