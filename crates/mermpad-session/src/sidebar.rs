//! Sidebar listing: every stored diagram, most recently updated first.

use mermpad_core::{DiagramId, Timestamp};
use mermpad_storage::{DiagramStore, Direction, RecordIndex, StorageError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarEntry {
    pub id: DiagramId,
    pub name: String,
    pub updated_at: Timestamp,
    /// True for the diagram currently shown in the editor.
    pub active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiagramListing {
    pub entries: Vec<SidebarEntry>,
}

impl DiagramListing {
    pub async fn load(
        store: &DiagramStore,
        active: Option<DiagramId>,
    ) -> Result<Self, StorageError> {
        let records = store
            .list_by(RecordIndex::UpdatedAt, Direction::Descending)
            .await?;
        let entries = records
            .into_iter()
            .map(|record| SidebarEntry {
                active: Some(record.id) == active,
                id: record.id,
                name: record.name,
                updated_at: record.updated_at,
            })
            .collect();
        Ok(DiagramListing { entries })
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn active(&self) -> Option<&SidebarEntry> {
        self.entries.iter().find(|e| e.active)
    }

    pub fn ids(&self) -> Vec<DiagramId> {
        self.entries.iter().map(|e| e.id).collect()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mermpad_core::DiagramPatch;

    use super::*;

    #[tokio::test]
    async fn newest_update_first_with_active_marked() {
        let store = DiagramStore::in_memory();
        store.initialize().await.unwrap();
        let a = store.create("a", "graph TD").await.unwrap();
        let b = store.create("b", "graph TD").await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        store
            .update(a, DiagramPatch::new().source_text("graph LR"))
            .await
            .unwrap();

        let listing = DiagramListing::load(&store, Some(b)).await.unwrap();
        assert_eq!(listing.ids(), vec![a, b]);
        assert_eq!(listing.active().map(|e| e.id), Some(b));
    }

    #[tokio::test]
    async fn empty_store_lists_nothing() {
        let store = DiagramStore::in_memory();
        store.initialize().await.unwrap();
        let listing = DiagramListing::load(&store, None).await.unwrap();
        assert!(listing.is_empty());
        assert!(listing.active().is_none());
    }
}
