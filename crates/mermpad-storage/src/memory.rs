//! In-memory implementation of [`RecordBackend`].
//!
//! [`InMemoryBackend`] is a first-class backend for tests, ephemeral
//! sessions and embedders that bring their own persistence. Records are
//! kept as JSON documents on a shared [`MemoryDisk`], which outlives any
//! single backend: dropping a store and opening a new one over the same
//! disk behaves like reloading the page over the same browser storage,
//! including running schema upgrades over older documents.
//!
//! The disk also carries fault switches (closing it, or capping its size)
//! so the `ReadFailed`/`WriteFailed` paths can be exercised.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};

use serde_json::Value;

use mermpad_core::{DiagramId, DiagramRecord};

use crate::error::StorageError;
use crate::schema::{COLLECTION, SCHEMA_VERSION, STORE_NAME};
use crate::traits::RecordBackend;
use crate::types::{Direction, OpenReport, RecordIndex};
use crate::upgrade::upgrade_documents;

/// The durable part of an in-memory store.
#[derive(Debug, Clone)]
struct MemoryDatabase {
    version: u32,
    /// Documents keyed by their `id`.
    documents: BTreeMap<String, Value>,
    /// Key paths of the secondary lookup paths created with the collection.
    lookup_paths: Vec<&'static str>,
}

#[derive(Debug, Default)]
struct DiskState {
    /// `None` until the store is first created.
    database: Option<MemoryDatabase>,
    closed: bool,
    quota_bytes: Option<usize>,
}

/// Shared backing storage for [`InMemoryBackend`]s.
///
/// Cloning a disk yields another handle onto the same data.
#[derive(Debug, Clone, Default)]
pub struct MemoryDisk {
    state: Arc<Mutex<DiskState>>,
}

impl MemoryDisk {
    /// Creates an empty disk with no store on it.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a disk holding a store already at `version` with the given
    /// raw documents. Documents without a string `id` are skipped.
    pub fn seeded(version: u32, documents: Vec<Value>) -> Self {
        let documents = documents
            .into_iter()
            .filter_map(|doc| {
                let key = doc.get("id")?.as_str()?.to_string();
                Some((key, doc))
            })
            .collect();
        let disk = MemoryDisk::new();
        if let Ok(mut state) = disk.state.lock() {
            state.database = Some(MemoryDatabase {
                version,
                documents,
                lookup_paths: RecordIndex::ALL.iter().map(|i| i.key_path()).collect(),
            });
        }
        disk
    }

    /// True once a store has been created on this disk.
    pub fn exists(&self) -> bool {
        self.lock().map(|s| s.database.is_some()).unwrap_or(false)
    }

    /// Schema version of the store on this disk, if one exists.
    pub fn schema_version(&self) -> Option<u32> {
        self.lock().ok()?.database.as_ref().map(|db| db.version)
    }

    /// Key paths of the lookup paths created with the collection.
    pub fn lookup_paths(&self) -> Vec<&'static str> {
        self.lock()
            .ok()
            .and_then(|s| s.database.as_ref().map(|db| db.lookup_paths.clone()))
            .unwrap_or_default()
    }

    /// Snapshot of the raw stored documents, ordered by id.
    pub fn documents(&self) -> Vec<Value> {
        self.lock()
            .ok()
            .and_then(|s| {
                s.database
                    .as_ref()
                    .map(|db| db.documents.values().cloned().collect())
            })
            .unwrap_or_default()
    }

    /// Makes every subsequent operation fail, as a closed browser store does.
    pub fn close(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = true;
        }
    }

    /// Undoes [`MemoryDisk::close`].
    pub fn reopen(&self) {
        if let Ok(mut state) = self.state.lock() {
            state.closed = false;
        }
    }

    /// Caps the total serialized size of all documents. `None` lifts the cap.
    pub fn set_quota_bytes(&self, quota: Option<usize>) {
        if let Ok(mut state) = self.state.lock() {
            state.quota_bytes = quota;
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, DiskState>, StorageError> {
        self.state
            .lock()
            .map_err(|_| StorageError::read("memory disk lock poisoned"))
    }
}

/// In-memory implementation of [`RecordBackend`].
#[derive(Debug)]
pub struct InMemoryBackend {
    disk: MemoryDisk,
    opened: bool,
}

impl InMemoryBackend {
    /// Creates a backend over `disk`. Nothing is touched until `open()`.
    pub fn new(disk: MemoryDisk) -> Self {
        InMemoryBackend {
            disk,
            opened: false,
        }
    }

    /// The disk this backend reads and writes.
    pub fn disk(&self) -> &MemoryDisk {
        &self.disk
    }

    /// Locks the disk and returns the open database, checking lifecycle and
    /// the closed switch. `on_closed` builds the error for a closed disk.
    fn with_database<R>(
        &self,
        on_closed: fn(&'static str) -> StorageError,
        f: impl FnOnce(&mut MemoryDatabase, Option<usize>) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        if !self.opened {
            return Err(StorageError::NotInitialized);
        }
        let mut state = self.disk.lock()?;
        if state.closed {
            return Err(on_closed("store closed"));
        }
        let quota = state.quota_bytes;
        match state.database.as_mut() {
            Some(db) => f(db, quota),
            None => Err(on_closed("store was deleted")),
        }
    }

    fn read<R>(
        &self,
        f: impl FnOnce(&mut MemoryDatabase) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        self.with_database(|reason| StorageError::read(reason), |db, _| f(db))
    }

    fn write<R>(
        &self,
        f: impl FnOnce(&mut MemoryDatabase, Option<usize>) -> Result<R, StorageError>,
    ) -> Result<R, StorageError> {
        self.with_database(|reason| StorageError::write(reason), f)
    }
}

fn decode(key: &str, doc: &Value) -> Result<DiagramRecord, StorageError> {
    serde_json::from_value(doc.clone())
        .map_err(|e| StorageError::read(format!("corrupt record {}: {}", key, e)))
}

fn decode_all(db: &MemoryDatabase) -> Result<Vec<DiagramRecord>, StorageError> {
    db.documents
        .iter()
        .map(|(key, doc)| decode(key, doc))
        .collect()
}

fn document_size(doc: &Value) -> usize {
    serde_json::to_vec(doc).map(|bytes| bytes.len()).unwrap_or(0)
}

/// Stores `doc` under `key`, enforcing the disk quota.
fn store_document(
    db: &mut MemoryDatabase,
    quota: Option<usize>,
    key: String,
    doc: Value,
) -> Result<(), StorageError> {
    if let Some(limit) = quota {
        let others: usize = db
            .documents
            .iter()
            .filter(|(k, _)| **k != key)
            .map(|(_, d)| document_size(d))
            .sum();
        let needed = others + document_size(&doc);
        if needed > limit {
            return Err(StorageError::write(format!(
                "quota exceeded: {} bytes needed, {} allowed",
                needed, limit
            )));
        }
    }
    db.documents.insert(key, doc);
    Ok(())
}

fn compare_by(index: RecordIndex, a: &DiagramRecord, b: &DiagramRecord) -> Ordering {
    match index {
        RecordIndex::Name => a.name.cmp(&b.name),
        RecordIndex::CreatedAt => a.created_at.cmp(&b.created_at),
        RecordIndex::UpdatedAt => a.updated_at.cmp(&b.updated_at),
    }
}

impl RecordBackend for InMemoryBackend {
    fn open(&mut self) -> Result<OpenReport, StorageError> {
        let mut state = self.disk.lock()?;
        if state.closed {
            return Err(StorageError::read("store closed"));
        }

        let report = match state.database.as_mut() {
            None => {
                state.database = Some(MemoryDatabase {
                    version: SCHEMA_VERSION,
                    documents: BTreeMap::new(),
                    lookup_paths: RecordIndex::ALL.iter().map(|i| i.key_path()).collect(),
                });
                tracing::info!(
                    "created store {} with collection '{}' at schema v{}",
                    STORE_NAME,
                    COLLECTION,
                    SCHEMA_VERSION
                );
                OpenReport {
                    previous_version: 0,
                    current_version: SCHEMA_VERSION,
                    created: true,
                }
            }
            Some(db) if db.version > SCHEMA_VERSION => {
                return Err(StorageError::Upgrade {
                    from: db.version,
                    to: SCHEMA_VERSION,
                    reason: "on-disk schema is newer than this build".to_string(),
                });
            }
            Some(db) => {
                let previous_version = db.version;
                for (version, changed) in upgrade_documents(db.documents.values_mut(), previous_version)
                {
                    tracing::info!(
                        "applied schema v{} upgrade to {}: {} record(s) backfilled",
                        version,
                        STORE_NAME,
                        changed
                    );
                }
                db.version = SCHEMA_VERSION;
                OpenReport {
                    previous_version,
                    current_version: SCHEMA_VERSION,
                    created: false,
                }
            }
        };

        self.opened = true;
        Ok(report)
    }

    fn schema_version(&self) -> Result<u32, StorageError> {
        self.read(|db| Ok(db.version))
    }

    fn insert(&mut self, record: &DiagramRecord) -> Result<(), StorageError> {
        let key = record.id.to_string();
        let doc = serde_json::to_value(record)?;
        self.write(|db, quota| {
            if db.documents.contains_key(&key) {
                return Err(StorageError::write(format!("key already exists: {}", key)));
            }
            store_document(db, quota, key, doc)
        })
    }

    fn put(&mut self, record: &DiagramRecord) -> Result<(), StorageError> {
        let key = record.id.to_string();
        let doc = serde_json::to_value(record)?;
        self.write(|db, quota| store_document(db, quota, key, doc))
    }

    fn get(&self, id: DiagramId) -> Result<Option<DiagramRecord>, StorageError> {
        let key = id.to_string();
        self.read(|db| {
            db.documents
                .get(&key)
                .map(|doc| decode(&key, doc))
                .transpose()
        })
    }

    fn get_all(&self) -> Result<Vec<DiagramRecord>, StorageError> {
        self.read(|db| decode_all(db))
    }

    fn delete(&mut self, id: DiagramId) -> Result<(), StorageError> {
        let key = id.to_string();
        self.write(|db, _| {
            db.documents.remove(&key);
            Ok(())
        })
    }

    fn list_by(
        &self,
        index: RecordIndex,
        direction: Direction,
    ) -> Result<Vec<DiagramRecord>, StorageError> {
        let mut records = self.read(|db| decode_all(db))?;
        records.sort_by(|a, b| {
            let primary = compare_by(index, a, b);
            let primary = match direction {
                Direction::Ascending => primary,
                Direction::Descending => primary.reverse(),
            };
            primary.then_with(|| a.id.cmp(&b.id))
        });
        Ok(records)
    }

    fn find_by_name(&self, name: &str) -> Result<Vec<DiagramRecord>, StorageError> {
        let mut records = self.read(|db| decode_all(db))?;
        records.retain(|r| r.name == name);
        records.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(records)
    }
}
