//! The async [`DiagramStore`] handle shared by the editing session.
//!
//! `DiagramStore` wraps a [`RecordBackend`] in `Arc<tokio::sync::Mutex<>>`
//! so it can be cloned into the autosave coordinator, the routing bridge
//! and background tasks. Every operation takes the lock for its whole
//! duration, which makes `update`'s read-modify-write a single critical
//! section against the backend. There is still no version check between
//! callers: two updates of the same record that race each other resolve
//! as last-write-wins.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use mermpad_core::{DiagramId, DiagramPatch, DiagramRecord, Timestamp};

use crate::error::StorageError;
use crate::memory::{InMemoryBackend, MemoryDisk};
use crate::sqlite::SqliteBackend;
use crate::traits::RecordBackend;
use crate::types::{Direction, OpenReport, RecordIndex};

struct StoreInner {
    backend: tokio::sync::Mutex<Box<dyn RecordBackend>>,
    initialized: AtomicBool,
}

/// Shared handle to the diagram store.
///
/// Construct it explicitly, call [`DiagramStore::initialize`] once, then
/// clone the handle wherever it is needed. Every operation invoked before
/// initialization completes fails with [`StorageError::NotInitialized`].
#[derive(Clone)]
pub struct DiagramStore {
    inner: Arc<StoreInner>,
}

impl std::fmt::Debug for DiagramStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiagramStore")
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

impl DiagramStore {
    /// Wraps an unopened backend.
    pub fn new(backend: impl RecordBackend + 'static) -> Self {
        Self::from_boxed(Box::new(backend))
    }

    pub fn from_boxed(backend: Box<dyn RecordBackend>) -> Self {
        DiagramStore {
            inner: Arc::new(StoreInner {
                backend: tokio::sync::Mutex::new(backend),
                initialized: AtomicBool::new(false),
            }),
        }
    }

    /// A store over a fresh, private in-memory disk.
    pub fn in_memory() -> Self {
        Self::new(InMemoryBackend::new(MemoryDisk::new()))
    }

    /// A store over an existing in-memory disk.
    pub fn on_disk(disk: &MemoryDisk) -> Self {
        Self::new(InMemoryBackend::new(disk.clone()))
    }

    /// A store over the SQLite database file inside `dir`.
    pub fn sqlite_in_dir(dir: impl AsRef<std::path::Path>) -> Self {
        Self::new(SqliteBackend::in_dir(dir))
    }

    /// True once [`DiagramStore::initialize`] has completed successfully.
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    fn ensure_initialized(&self) -> Result<(), StorageError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(StorageError::NotInitialized)
        }
    }

    /// Opens the durable store, creating and upgrading it as needed.
    ///
    /// Calling it again after success re-opens nothing and reports the
    /// current version.
    pub async fn initialize(&self) -> Result<OpenReport, StorageError> {
        let mut backend = self.inner.backend.lock().await;
        let report = backend.open()?;
        self.inner.initialized.store(true, Ordering::Release);
        tracing::debug!(
            "diagram store ready at schema v{} (was v{})",
            report.current_version,
            report.previous_version
        );
        Ok(report)
    }

    /// On-disk schema version.
    pub async fn schema_version(&self) -> Result<u32, StorageError> {
        self.ensure_initialized()?;
        self.inner.backend.lock().await.schema_version()
    }

    /// Creates a record and returns its freshly generated id.
    pub async fn create(&self, name: &str, source_text: &str) -> Result<DiagramId, StorageError> {
        self.ensure_initialized()?;
        let record = DiagramRecord::new(DiagramId::generate(), name, source_text, Timestamp::now());
        self.inner.backend.lock().await.insert(&record)?;
        tracing::debug!("created diagram {} ('{}')", record.id, record.name);
        Ok(record.id)
    }

    /// Every record, in no particular order.
    pub async fn get_all(&self) -> Result<Vec<DiagramRecord>, StorageError> {
        self.ensure_initialized()?;
        self.inner.backend.lock().await.get_all()
    }

    /// The record with `id`, or `None` if there is none.
    pub async fn get_by_id(&self, id: DiagramId) -> Result<Option<DiagramRecord>, StorageError> {
        self.ensure_initialized()?;
        self.inner.backend.lock().await.get(id)
    }

    /// Merges `patch` over the current record and persists the result.
    ///
    /// The current state is read under the same lock as the write, so the
    /// merge never uses a stale copy. Returns the merged record.
    pub async fn update(
        &self,
        id: DiagramId,
        patch: DiagramPatch,
    ) -> Result<DiagramRecord, StorageError> {
        self.ensure_initialized()?;
        let mut backend = self.inner.backend.lock().await;
        let mut record = backend.get(id)?.ok_or(StorageError::NotFound(id))?;
        record.apply(&patch, Timestamp::now());
        backend.put(&record)?;
        Ok(record)
    }

    /// Deletes a record. Deleting an absent id succeeds.
    pub async fn delete(&self, id: DiagramId) -> Result<(), StorageError> {
        self.ensure_initialized()?;
        self.inner.backend.lock().await.delete(id)?;
        tracing::debug!("deleted diagram {}", id);
        Ok(())
    }

    /// Every record ordered by a secondary lookup path.
    pub async fn list_by(
        &self,
        index: RecordIndex,
        direction: Direction,
    ) -> Result<Vec<DiagramRecord>, StorageError> {
        self.ensure_initialized()?;
        self.inner.backend.lock().await.list_by(index, direction)
    }

    /// Records whose name equals `name`.
    pub async fn find_by_name(&self, name: &str) -> Result<Vec<DiagramRecord>, StorageError> {
        self.ensure_initialized()?;
        self.inner.backend.lock().await.find_by_name(name)
    }
}
