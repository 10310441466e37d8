//! Integration tests for DiagramStore over both backends.

use std::collections::HashSet;
use std::time::Duration;

use proptest::prelude::*;
use serde_json::json;

use mermpad_core::{DiagramId, DiagramPatch, DEFAULT_ZOOM_PERCENT};
use mermpad_storage::{
    DiagramStore, Direction, MemoryDisk, RecordIndex, SqliteBackend, StorageError, SCHEMA_VERSION,
};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

async fn ready_memory_store() -> DiagramStore {
    let store = DiagramStore::in_memory();
    store.initialize().await.unwrap();
    store
}

async fn ready_sqlite_store() -> DiagramStore {
    let store = DiagramStore::new(SqliteBackend::in_memory());
    store.initialize().await.unwrap();
    store
}

// ---------------------------------------------------------------------------
// CRUD contract, run against both backends
// ---------------------------------------------------------------------------

async fn check_crud_contract(store: DiagramStore) {
    let id = store.create("Flow", "graph TD\n A-->B").await.unwrap();
    let created = store.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(created.id, id);
    assert_eq!(created.name, "Flow");
    assert_eq!(created.source_text, "graph TD\n A-->B");
    assert_eq!(created.created_at, created.updated_at);

    let renamed = store
        .update(id, DiagramPatch::new().name("Renamed"))
        .await
        .unwrap();
    assert_eq!(renamed.source_text, "graph TD\n A-->B");
    assert_eq!(renamed.created_at, created.created_at);
    assert!(renamed.updated_at > created.updated_at);

    let edited = store
        .update(id, DiagramPatch::new().source_text("graph LR"))
        .await
        .unwrap();
    assert_eq!(edited.name, "Renamed");

    store.delete(id).await.unwrap();
    assert_eq!(store.get_by_id(id).await.unwrap(), None);
    store.delete(id).await.unwrap();
    assert!(matches!(
        store.update(id, DiagramPatch::new()).await,
        Err(StorageError::NotFound(_))
    ));
}

#[tokio::test]
async fn crud_contract_memory() {
    check_crud_contract(ready_memory_store().await).await;
}

#[tokio::test]
async fn crud_contract_sqlite() {
    check_crud_contract(ready_sqlite_store().await).await;
}

#[tokio::test]
async fn empty_updates_advance_updated_at_only() {
    for store in [ready_memory_store().await, ready_sqlite_store().await] {
        let id = store.create("Flow", "graph TD").await.unwrap();
        let mut last = store.get_by_id(id).await.unwrap().unwrap();
        for _ in 0..5 {
            let next = store.update(id, DiagramPatch::new()).await.unwrap();
            assert_eq!(next.name, last.name);
            assert_eq!(next.source_text, last.source_text);
            assert_eq!(next.view_zoom_percent, last.view_zoom_percent);
            assert!(next.updated_at > last.updated_at);
            last = next;
        }
    }
}

#[tokio::test]
async fn sidebar_ordering_uses_updated_at() {
    let store = ready_memory_store().await;
    let first = store.create("first", "a").await.unwrap();
    let second = store.create("second", "b").await.unwrap();
    tokio::time::sleep(Duration::from_millis(5)).await;
    store
        .update(first, DiagramPatch::new().source_text("a2"))
        .await
        .unwrap();

    let listing = store
        .list_by(RecordIndex::UpdatedAt, Direction::Descending)
        .await
        .unwrap();
    let ids: Vec<DiagramId> = listing.iter().map(|r| r.id).collect();
    assert_eq!(ids, vec![first, second]);
    assert_eq!(store.find_by_name("second").await.unwrap().len(), 1);
}

// ---------------------------------------------------------------------------
// Reload and upgrade
// ---------------------------------------------------------------------------

#[tokio::test]
async fn memory_reload_keeps_records() {
    let disk = MemoryDisk::new();
    let store = DiagramStore::on_disk(&disk);
    store.initialize().await.unwrap();
    let id = store.create("Flow", "graph TD\n A-->B").await.unwrap();
    let record = store.get_by_id(id).await.unwrap().unwrap();
    assert!(record.view_zoom_percent.is_none() || record.zoom_percent() == DEFAULT_ZOOM_PERCENT);
    drop(store);

    let reloaded = DiagramStore::on_disk(&disk);
    let report = reloaded.initialize().await.unwrap();
    assert!(!report.created);
    let all = reloaded.get_all().await.unwrap();
    let flow = all.iter().find(|r| r.name == "Flow").unwrap();
    assert_eq!(flow.source_text, "graph TD\n A-->B");
    assert_eq!(flow, &record);
}

#[tokio::test]
async fn sqlite_reload_keeps_records() {
    let dir = tempfile::tempdir().unwrap();
    let record = {
        let store = DiagramStore::sqlite_in_dir(dir.path());
        store.initialize().await.unwrap();
        let id = store.create("Flow", "graph TD\n A-->B").await.unwrap();
        store.get_by_id(id).await.unwrap().unwrap()
    };

    let reloaded = DiagramStore::sqlite_in_dir(dir.path());
    reloaded.initialize().await.unwrap();
    assert_eq!(reloaded.schema_version().await.unwrap(), SCHEMA_VERSION);
    let all = reloaded.get_all().await.unwrap();
    assert_eq!(all, vec![record]);
}

#[tokio::test]
async fn upgrade_from_v1_then_reopen_is_stable() {
    let id = DiagramId::generate();
    let disk = MemoryDisk::seeded(
        1,
        vec![json!({
            "id": id.to_string(),
            "name": "Legacy",
            "sourceText": "graph LR",
            "createdAt": 1_000,
            "updatedAt": 2_000,
        })],
    );

    let store = DiagramStore::on_disk(&disk);
    let report = store.initialize().await.unwrap();
    assert!(report.upgraded());
    let after_first = disk.documents();
    let record = store.get_by_id(id).await.unwrap().unwrap();
    assert_eq!(record.view_zoom_percent, Some(DEFAULT_ZOOM_PERCENT));
    assert_eq!(record.updated_at.0, 2_000);

    let again = DiagramStore::on_disk(&disk);
    again.initialize().await.unwrap();
    assert_eq!(disk.documents(), after_first);
}

#[tokio::test]
async fn write_faults_surface_as_write_failed() {
    let disk = MemoryDisk::new();
    let store = DiagramStore::on_disk(&disk);
    store.initialize().await.unwrap();
    let id = store.create("Flow", "graph TD").await.unwrap();

    disk.set_quota_bytes(Some(10));
    assert!(matches!(
        store.create("Other", "graph LR").await,
        Err(StorageError::WriteFailed { .. })
    ));
    assert!(matches!(
        store.update(id, DiagramPatch::new().source_text("x".repeat(500))).await,
        Err(StorageError::WriteFailed { .. })
    ));
    disk.set_quota_bytes(None);

    disk.close();
    assert!(matches!(store.get_all().await, Err(StorageError::ReadFailed { .. })));
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn create_then_get_roundtrips(
        entries in proptest::collection::vec((".{0,24}", "(?s).{0,200}"), 1..8),
    ) {
        runtime().block_on(async {
            let store = ready_memory_store().await;
            let mut seen = HashSet::new();
            for (name, source) in &entries {
                let id = store.create(name, source).await.unwrap();
                prop_assert!(seen.insert(id));
                let record = store.get_by_id(id).await.unwrap().unwrap();
                prop_assert_eq!(&record.name, name);
                prop_assert_eq!(&record.source_text, source);
                prop_assert_eq!(record.created_at, record.updated_at);
            }
            prop_assert_eq!(store.get_all().await.unwrap().len(), entries.len());
            Ok(())
        })?;
    }

    #[test]
    fn name_update_preserves_source(
        name in "\\PC{0,24}",
        source in "[\\PC\n]{0,200}",
        new_name in "\\PC{0,24}",
    ) {
        runtime().block_on(async {
            let store = ready_sqlite_store().await;
            let id = store.create(&name, &source).await.unwrap();
            let updated = store.update(id, DiagramPatch::new().name(new_name.clone())).await.unwrap();
            prop_assert_eq!(&updated.name, &new_name);
            prop_assert_eq!(&updated.source_text, &source);
            prop_assert_eq!(updated.id, id);
            Ok(())
        })?;
    }
}
