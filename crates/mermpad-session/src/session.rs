//! The editor session: one store, one autosave coordinator, one bridge.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use mermpad_core::{DiagramId, DiagramRecord, DEFAULT_ZOOM_PERCENT};
use mermpad_storage::{DiagramStore, OpenReport};

use crate::autosave::{AutosaveCoordinator, AutosaveStatus, EditEvent};
use crate::bridge::{Resolution, SelectionBridge, Templates};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::location::Location;
use crate::render::{render_preview, DiagramRenderer, PreviewContent};
use crate::sidebar::DiagramListing;

/// What the editor pane currently holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorDocument {
    pub binding: Option<DiagramId>,
    pub name: Option<String>,
    pub source_text: String,
    pub zoom_percent: u32,
}

impl EditorDocument {
    fn from_resolution(resolution: &Resolution) -> Self {
        match resolution {
            Resolution::Draft { source_text } => EditorDocument {
                binding: None,
                name: None,
                source_text: source_text.clone(),
                zoom_percent: DEFAULT_ZOOM_PERCENT,
            },
            Resolution::Loaded(record) => Self::from_record(record),
        }
    }

    fn from_record(record: &DiagramRecord) -> Self {
        EditorDocument {
            binding: Some(record.id),
            name: Some(record.name.clone()),
            source_text: record.source_text.clone(),
            zoom_percent: record.zoom_percent(),
        }
    }
}

pub struct EditorSession {
    store: DiagramStore,
    autosave: AutosaveCoordinator,
    bridge: SelectionBridge,
    renderer: Arc<dyn DiagramRenderer>,
    document: Mutex<EditorDocument>,
    listing: Mutex<DiagramListing>,
}

impl EditorSession {
    /// Opens the store named by `config` and resolves the location's
    /// current reference. Must run inside a tokio runtime.
    pub async fn open(
        config: &SessionConfig,
        location: Arc<dyn Location>,
        renderer: Arc<dyn DiagramRenderer>,
    ) -> Result<Self, SessionError> {
        Self::with_store(config.store(), config, location, renderer).await
    }

    pub async fn with_store(
        store: DiagramStore,
        config: &SessionConfig,
        location: Arc<dyn Location>,
        renderer: Arc<dyn DiagramRenderer>,
    ) -> Result<Self, SessionError> {
        if !store.is_initialized() {
            let report: OpenReport = store.initialize().await?;
            tracing::info!(
                "diagram store ready at version {} (created: {}, upgraded: {})",
                report.current_version,
                report.created,
                report.upgraded()
            );
        }

        let autosave = AutosaveCoordinator::new(store.clone(), config.quiet_interval());
        let bridge = SelectionBridge::new(
            store.clone(),
            autosave.clone(),
            location,
            Templates {
                new_diagram_source: config.new_diagram_source.clone(),
                draft_source: config.draft_source.clone(),
            },
        );
        let resolution = bridge.resolve_current().await;

        let session = EditorSession {
            store,
            autosave,
            bridge,
            renderer,
            document: Mutex::new(EditorDocument::from_resolution(&resolution)),
            listing: Mutex::new(DiagramListing::default()),
        };
        session.refresh_sidebar().await;
        Ok(session)
    }

    pub fn store(&self) -> &DiagramStore {
        &self.store
    }

    pub fn autosave(&self) -> &AutosaveCoordinator {
        &self.autosave
    }

    pub fn bridge(&self) -> &SelectionBridge {
        &self.bridge
    }

    pub fn document(&self) -> EditorDocument {
        self.doc().clone()
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.autosave.status()
    }

    /// Re-resolves the location, e.g. after external navigation.
    pub async fn navigate(&self) -> Resolution {
        let resolution = self.bridge.resolve_current().await;
        *self.doc() = EditorDocument::from_resolution(&resolution);
        resolution
    }

    /// Applies an edit from the editor pane. Returns true if autosave
    /// scheduled a write; draft edits stay in memory only.
    pub fn edit(&self, source_text: impl Into<String>) -> bool {
        let source_text = source_text.into();
        let binding = {
            let mut doc = self.doc();
            doc.source_text = source_text.clone();
            doc.binding
        };
        self.autosave.on_edit(EditEvent::new(binding, source_text))
    }

    /// Preview of the editor's current text.
    pub fn preview(&self) -> PreviewContent {
        let source = self.doc().source_text.clone();
        render_preview(self.renderer.as_ref(), &source)
    }

    pub async fn create_diagram(&self, name: &str) -> Result<DiagramRecord, SessionError> {
        let record = self.bridge.create(name).await?;
        *self.doc() = EditorDocument::from_record(&record);
        self.refresh_sidebar().await;
        Ok(record)
    }

    /// Saves the draft currently in the editor under `name`.
    pub async fn save_draft(&self, name: &str) -> Result<DiagramRecord, SessionError> {
        let source = self.doc().source_text.clone();
        let record = self.bridge.save_draft(name, &source).await?;
        *self.doc() = EditorDocument::from_record(&record);
        self.refresh_sidebar().await;
        Ok(record)
    }

    pub async fn select(&self, id: DiagramId) -> Result<Resolution, SessionError> {
        let resolution = self.bridge.select(id).await?;
        *self.doc() = EditorDocument::from_resolution(&resolution);
        self.refresh_sidebar().await;
        Ok(resolution)
    }

    pub async fn rename(&self, id: DiagramId, name: &str) -> Result<DiagramRecord, SessionError> {
        let record = self.bridge.rename(id, name).await?;
        {
            let mut doc = self.doc();
            if doc.binding == Some(id) {
                doc.name = Some(record.name.clone());
            }
        }
        self.refresh_sidebar().await;
        Ok(record)
    }

    pub async fn set_zoom(&self, percent: u32) -> Result<Option<DiagramRecord>, SessionError> {
        let binding = self.doc().binding;
        let Some(id) = binding else {
            self.doc().zoom_percent = percent;
            return Ok(None);
        };
        let record = self.bridge.set_zoom(id, percent).await?;
        {
            let mut doc = self.doc();
            if doc.binding == Some(id) {
                doc.zoom_percent = record.zoom_percent();
            }
        }
        Ok(Some(record))
    }

    pub async fn delete(&self, id: DiagramId) -> Result<(), SessionError> {
        if self.bridge.delete(id).await? {
            let draft = self.bridge.resolve(None).await;
            *self.doc() = EditorDocument::from_resolution(&draft);
        }
        self.refresh_sidebar().await;
        Ok(())
    }

    /// Writes any pending autosave now.
    pub async fn flush(&self) -> Result<(), SessionError> {
        self.autosave.flush().await?;
        Ok(())
    }

    /// Last loaded sidebar listing.
    pub fn sidebar(&self) -> DiagramListing {
        self.listing
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Reloads the sidebar. On failure the previous listing is kept.
    pub async fn refresh_sidebar(&self) -> DiagramListing {
        let active = self.doc().binding;
        let loaded = DiagramListing::load(&self.store, active).await;
        let mut listing = self.listing.lock().unwrap_or_else(PoisonError::into_inner);
        match loaded {
            Ok(fresh) => *listing = fresh,
            Err(err) => tracing::error!("failed to load diagrams: {}", err),
        }
        listing.clone()
    }

    fn doc(&self) -> MutexGuard<'_, EditorDocument> {
        self.document.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for EditorSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EditorSession")
            .field("store", &self.store)
            .field("document", &self.document())
            .finish()
    }
}

/// Installs a `fmt` subscriber for the host process. Later calls are no-ops.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt().with_target(false).try_init();
}
