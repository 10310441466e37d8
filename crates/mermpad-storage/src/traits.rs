//! The [`RecordBackend`] trait defining the storage contract for diagrams.
//!
//! Backends are small and synchronous: they own the durable
//! state and the schema upgrade, and expose single-record primitives. The
//! async lifecycle, timestamping and read-modify-write logic live once in
//! [`DiagramStore`](crate::store::DiagramStore), so every backend is fully
//! swappable, including test doubles.

use mermpad_core::{DiagramId, DiagramRecord};

use crate::error::StorageError;
use crate::types::{Direction, OpenReport, RecordIndex};

/// The storage contract for diagram records.
pub trait RecordBackend: Send {
    /// Opens the durable store, creating it if absent, and upgrades it to
    /// [`SCHEMA_VERSION`](crate::schema::SCHEMA_VERSION).
    ///
    /// Opening an already-open backend is a no-op that reports the current
    /// version.
    fn open(&mut self) -> Result<OpenReport, StorageError>;

    /// Returns the on-disk schema version.
    fn schema_version(&self) -> Result<u32, StorageError>;

    /// Adds a new record. Fails with [`StorageError::WriteFailed`] if the id
    /// is already taken.
    fn insert(&mut self, record: &DiagramRecord) -> Result<(), StorageError>;

    /// Overwrites (or adds) the record stored under `record.id`.
    fn put(&mut self, record: &DiagramRecord) -> Result<(), StorageError>;

    /// Retrieves a record. `Ok(None)` means not found.
    fn get(&self, id: DiagramId) -> Result<Option<DiagramRecord>, StorageError>;

    /// Returns every record, in no particular order.
    fn get_all(&self) -> Result<Vec<DiagramRecord>, StorageError>;

    /// Removes a record. Removing an absent id succeeds.
    fn delete(&mut self, id: DiagramId) -> Result<(), StorageError>;

    /// Returns every record ordered by a secondary lookup path. Ties are
    /// broken by ascending id.
    fn list_by(
        &self,
        index: RecordIndex,
        direction: Direction,
    ) -> Result<Vec<DiagramRecord>, StorageError>;

    /// Returns the records whose name equals `name` exactly.
    fn find_by_name(&self, name: &str) -> Result<Vec<DiagramRecord>, StorageError>;
}
