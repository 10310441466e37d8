//! Selection/routing bridge.
//!
//! Keeps three things in agreement: the reference carried by the
//! [`Location`], the diagram bound to autosave, and what the editor shows.
//!
//! Resolving a reference never fails. A token that does not parse, names a
//! diagram that is gone, or cannot be read is logged, removed from the
//! location, and the editor falls back to the draft. Nothing is created on
//! the way. Explicit user actions (create, rename, ...) return
//! [`SessionError`] instead.

use std::sync::Arc;

use mermpad_core::{DiagramId, DiagramName, DiagramPatch, DiagramRecord};
use mermpad_storage::{DiagramStore, StorageError};

use crate::autosave::AutosaveCoordinator;
use crate::error::SessionError;
use crate::location::Location;

/// What the editor should display after resolving a reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Unsaved draft; autosave is unbound.
    Draft { source_text: String },
    /// A stored diagram, now bound to autosave.
    Loaded(DiagramRecord),
}

impl Resolution {
    pub fn source_text(&self) -> &str {
        match self {
            Resolution::Draft { source_text } => source_text,
            Resolution::Loaded(record) => &record.source_text,
        }
    }

    pub fn binding(&self) -> Option<DiagramId> {
        match self {
            Resolution::Draft { .. } => None,
            Resolution::Loaded(record) => Some(record.id),
        }
    }
}

/// Source templates used by the bridge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Templates {
    pub new_diagram_source: String,
    pub draft_source: String,
}

pub struct SelectionBridge {
    store: DiagramStore,
    autosave: AutosaveCoordinator,
    location: Arc<dyn Location>,
    templates: Templates,
}

impl SelectionBridge {
    pub fn new(
        store: DiagramStore,
        autosave: AutosaveCoordinator,
        location: Arc<dyn Location>,
        templates: Templates,
    ) -> Self {
        SelectionBridge {
            store,
            autosave,
            location,
            templates,
        }
    }

    pub fn location(&self) -> &Arc<dyn Location> {
        &self.location
    }

    /// Resolves whatever reference the location currently carries.
    pub async fn resolve_current(&self) -> Resolution {
        let token = self.location.current();
        self.resolve(token.as_deref()).await
    }

    /// Resolves `reference` to something the editor can show.
    pub async fn resolve(&self, reference: Option<&str>) -> Resolution {
        let Some(token) = reference else {
            return self.draft();
        };

        let id = match DiagramId::parse(token) {
            Ok(id) => id,
            Err(err) => {
                tracing::warn!("ignoring diagram reference: {}", err);
                return self.clear_reference();
            }
        };

        match self.store.get_by_id(id).await {
            Ok(Some(record)) => self.show(record),
            Ok(None) => {
                tracing::warn!("diagram {} referenced by location not found", id);
                self.clear_reference()
            }
            Err(err) => {
                tracing::error!("failed to load diagram {}: {}", id, err);
                self.clear_reference()
            }
        }
    }

    /// Selects a diagram from the sidebar. A diagram that has vanished in
    /// the meantime falls back to the draft like a broken reference.
    pub async fn select(&self, id: DiagramId) -> Result<Resolution, SessionError> {
        match self.store.get_by_id(id).await? {
            Some(record) => {
                self.location.push(&id.to_string());
                Ok(self.show(record))
            }
            None => {
                tracing::warn!("selected diagram {} no longer exists", id);
                Ok(self.clear_reference())
            }
        }
    }

    /// Creates a diagram from the new-diagram template and selects it.
    pub async fn create(&self, name: &str) -> Result<DiagramRecord, SessionError> {
        let source = self.templates.new_diagram_source.clone();
        self.store_and_select(name, &source).await
    }

    /// Persists the draft text as a new diagram and selects it.
    pub async fn save_draft(
        &self,
        name: &str,
        source_text: &str,
    ) -> Result<DiagramRecord, SessionError> {
        self.store_and_select(name, source_text).await
    }

    pub async fn rename(&self, id: DiagramId, name: &str) -> Result<DiagramRecord, SessionError> {
        let name = DiagramName::new(name)?;
        let record = self
            .store
            .update(id, DiagramPatch::new().name(name.into_string()))
            .await
            .inspect_err(|err| tracing::error!("failed to rename diagram {}: {}", id, err))?;
        tracing::info!("renamed diagram {} to {:?}", id, record.name);
        Ok(record)
    }

    pub async fn set_zoom(&self, id: DiagramId, percent: u32) -> Result<DiagramRecord, SessionError> {
        let record = self
            .store
            .update(id, DiagramPatch::new().view_zoom_percent(percent))
            .await?;
        Ok(record)
    }

    /// Deletes a diagram. Deleting the bound diagram unbinds autosave and
    /// clears the location; returns true in that case.
    pub async fn delete(&self, id: DiagramId) -> Result<bool, SessionError> {
        let was_bound = self.autosave.bound() == Some(id);
        // Pending text stays scheduled until the record is really gone.
        self.store
            .delete(id)
            .await
            .inspect_err(|err| tracing::error!("failed to delete diagram {}: {}", id, err))?;
        tracing::info!("deleted diagram {}", id);

        if was_bound {
            self.autosave.bind(None);
            self.location.replace(None);
        }
        Ok(was_bound)
    }

    async fn store_and_select(
        &self,
        name: &str,
        source_text: &str,
    ) -> Result<DiagramRecord, SessionError> {
        let name = DiagramName::new(name)?;
        let id = self
            .store
            .create(name.as_str(), source_text)
            .await
            .inspect_err(|err| tracing::error!("failed to create diagram: {}", err))?;
        let record = self
            .store
            .get_by_id(id)
            .await?
            .ok_or(StorageError::NotFound(id))?;
        tracing::info!("created diagram {} ({:?})", id, record.name);

        self.location.push(&id.to_string());
        self.autosave.bind(Some(id));
        Ok(record)
    }

    /// Binds `record`. Re-showing the bound diagram keeps its pending
    /// write, and the editor gets the unsaved text rather than the stored one.
    fn show(&self, mut record: DiagramRecord) -> Resolution {
        self.autosave.bind(Some(record.id));
        if let Some(text) = self.autosave.pending_text(record.id) {
            record.source_text = text;
        }
        Resolution::Loaded(record)
    }

    fn draft(&self) -> Resolution {
        self.autosave.bind(None);
        Resolution::Draft {
            source_text: self.templates.draft_source.clone(),
        }
    }

    fn clear_reference(&self) -> Resolution {
        self.location.replace(None);
        self.draft()
    }
}

impl std::fmt::Debug for SelectionBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SelectionBridge")
            .field("current", &self.location.current())
            .field("autosave", &self.autosave)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use mermpad_storage::MemoryDisk;

    use super::*;
    use crate::location::MemoryLocation;

    struct Fixture {
        disk: MemoryDisk,
        store: DiagramStore,
        autosave: AutosaveCoordinator,
        location: MemoryLocation,
        bridge: SelectionBridge,
    }

    async fn fixture(start: Option<&str>) -> Fixture {
        let disk = MemoryDisk::new();
        let store = DiagramStore::on_disk(&disk);
        store.initialize().await.unwrap();
        let autosave = AutosaveCoordinator::new(store.clone(), Duration::from_secs(1));
        let location = match start {
            Some(token) => MemoryLocation::at(token),
            None => MemoryLocation::new(),
        };
        let bridge = SelectionBridge::new(
            store.clone(),
            autosave.clone(),
            Arc::new(location.clone()),
            Templates {
                new_diagram_source: "graph TD\n    A[Start] --> B[End]".to_string(),
                draft_source: "graph TD\n    draft".to_string(),
            },
        );
        Fixture {
            disk,
            store,
            autosave,
            location,
            bridge,
        }
    }

    #[tokio::test]
    async fn no_reference_shows_draft() {
        let f = fixture(None).await;
        let resolution = f.bridge.resolve_current().await;
        assert_eq!(resolution.binding(), None);
        assert_eq!(resolution.source_text(), "graph TD\n    draft");
        assert_eq!(f.autosave.bound(), None);
    }

    #[tokio::test]
    async fn unknown_reference_falls_back_without_creating() {
        let f = fixture(Some("2f9b7a52-2a43-4a7e-a7b5-1c1d3b1f0b11")).await;
        let resolution = f.bridge.resolve_current().await;
        assert!(matches!(resolution, Resolution::Draft { .. }));
        assert_eq!(f.location.current(), None);
        assert!(f.store.get_all().await.unwrap().is_empty());
        assert_eq!(f.autosave.bound(), None);
    }

    #[tokio::test]
    async fn malformed_reference_is_cleared() {
        let f = fixture(Some("not-a-diagram")).await;
        let resolution = f.bridge.resolve_current().await;
        assert!(matches!(resolution, Resolution::Draft { .. }));
        assert_eq!(f.location.current(), None);
    }

    #[tokio::test]
    async fn unreadable_store_falls_back_to_draft() {
        let f = fixture(None).await;
        let id = f.store.create("Flow", "graph TD").await.unwrap();
        f.disk.close();
        let resolution = f.bridge.resolve(Some(&id.to_string())).await;
        assert!(matches!(resolution, Resolution::Draft { .. }));
        assert_eq!(f.autosave.bound(), None);
    }

    #[tokio::test]
    async fn existing_reference_binds() {
        let f = fixture(None).await;
        let id = f.store.create("Flow", "graph LR").await.unwrap();
        f.location.push(&id.to_string());
        let resolution = f.bridge.resolve_current().await;
        assert_eq!(resolution.binding(), Some(id));
        assert_eq!(resolution.source_text(), "graph LR");
        assert_eq!(f.autosave.bound(), Some(id));
    }

    #[tokio::test]
    async fn create_uses_template_and_navigates() {
        let f = fixture(None).await;
        let record = f.bridge.create("  New one ").await.unwrap();
        assert_eq!(record.name, "New one");
        assert_eq!(record.source_text, "graph TD\n    A[Start] --> B[End]");
        assert_eq!(f.location.current(), Some(record.id.to_string()));
        assert_eq!(f.autosave.bound(), Some(record.id));
    }

    #[tokio::test]
    async fn blank_name_is_rejected() {
        let f = fixture(None).await;
        let err = f.bridge.save_draft("   ", "graph TD").await.unwrap_err();
        assert!(matches!(err, SessionError::Invalid(_)));
        assert!(f.store.get_all().await.unwrap().is_empty());
        assert_eq!(f.location.current(), None);
    }

    #[tokio::test]
    async fn deleting_active_diagram_returns_to_draft() {
        let f = fixture(None).await;
        let keep = f.bridge.create("keep").await.unwrap();
        let gone = f.bridge.create("gone").await.unwrap();

        assert!(f.bridge.delete(gone.id).await.unwrap());
        assert_eq!(f.autosave.bound(), None);
        assert_eq!(f.location.current(), None);

        f.bridge.select(keep.id).await.unwrap();
        let other = f.store.create("other", "graph TD").await.unwrap();
        assert!(!f.bridge.delete(other).await.unwrap());
        assert_eq!(f.autosave.bound(), Some(keep.id));
    }

    #[tokio::test]
    async fn selecting_vanished_diagram_clears_location() {
        let f = fixture(None).await;
        let id = f.store.create("Flow", "graph TD").await.unwrap();
        f.store.delete(id).await.unwrap();
        let resolution = f.bridge.select(id).await.unwrap();
        assert!(matches!(resolution, Resolution::Draft { .. }));
        assert_eq!(f.location.current(), None);
    }

    #[tokio::test]
    async fn rename_and_zoom_update_record() {
        let f = fixture(None).await;
        let record = f.bridge.create("Flow").await.unwrap();
        let renamed = f.bridge.rename(record.id, " Renamed ").await.unwrap();
        assert_eq!(renamed.name, "Renamed");
        let zoomed = f.bridge.set_zoom(record.id, 150).await.unwrap();
        assert_eq!(zoomed.zoom_percent(), 150);
        assert_eq!(zoomed.name, "Renamed");

        let missing = DiagramId::generate();
        assert!(f.bridge.rename(missing, "x").await.unwrap_err().is_not_found());
    }

    #[tokio::test(start_paused = true)]
    async fn reselecting_bound_diagram_keeps_unsaved_text() {
        let f = fixture(None).await;
        let record = f.bridge.create("Flow").await.unwrap();
        f.autosave
            .on_edit(crate::autosave::EditEvent::new(Some(record.id), "graph TD\n typed"));

        let resolution = f.bridge.select(record.id).await.unwrap();
        assert_eq!(resolution.source_text(), "graph TD\n typed");
        assert!(f.autosave.has_pending());

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(
            f.store.get_by_id(record.id).await.unwrap().unwrap().source_text,
            "graph TD\n typed"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn failed_delete_keeps_binding_and_pending_write() {
        let f = fixture(None).await;
        let record = f.bridge.create("Flow").await.unwrap();
        f.autosave
            .on_edit(crate::autosave::EditEvent::new(Some(record.id), "graph TD\n typed"));

        f.disk.close();
        assert!(f.bridge.delete(record.id).await.is_err());
        f.disk.reopen();
        assert_eq!(f.autosave.bound(), Some(record.id));
        assert_eq!(f.location.current(), Some(record.id.to_string()));

        tokio::time::sleep(Duration::from_millis(1_100)).await;
        assert_eq!(
            f.store.get_by_id(record.id).await.unwrap().unwrap().source_text,
            "graph TD\n typed"
        );
    }
}
