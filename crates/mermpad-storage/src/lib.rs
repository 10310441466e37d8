//! Schema-versioned persistent storage for mermpad diagrams.
//!
//! Provides the [`RecordBackend`] trait defining the storage contract that
//! all backends implement, the [`InMemoryBackend`] and [`SqliteBackend`] as
//! first-class backends, and the async [`DiagramStore`] handle the editing
//! session talks to.
//!
//! # Architecture
//!
//! The storage layer has a two-layer API:
//! - **Backends** own the durable state, the secondary lookup paths and the
//!   schema upgrade procedure, and expose synchronous single-record
//!   primitives (insert/put/get/delete).
//! - **[`DiagramStore`]** adds the `initialize` lifecycle, id generation,
//!   timestamping and the read-modify-write `update`, once for all backends.
//!
//! # Modules
//!
//! - [`error`]: StorageError enum with all failure modes
//! - [`types`]: lookup paths, ordering and open reports
//! - [`traits`]: RecordBackend trait definition
//! - [`schema`]: persisted layout constants and SQLite migrations
//! - [`upgrade`]: record-level upgrade steps for document backends
//! - [`memory`]: InMemoryBackend over a shared MemoryDisk
//! - [`sqlite`]: SqliteBackend implementation
//! - [`store`]: the async DiagramStore handle

pub mod error;
pub mod memory;
pub mod schema;
pub mod sqlite;
pub mod store;
pub mod traits;
pub mod types;
pub mod upgrade;

// Re-export key types for ergonomic use.
pub use error::StorageError;
pub use memory::{InMemoryBackend, MemoryDisk};
pub use schema::{COLLECTION, SCHEMA_VERSION, STORE_NAME};
pub use sqlite::SqliteBackend;
pub use store::DiagramStore;
pub use traits::RecordBackend;
pub use types::{Direction, OpenReport, RecordIndex};
