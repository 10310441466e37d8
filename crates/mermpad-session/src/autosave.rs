//! Debounced autosave of the bound diagram's source text.
//!
//! Every accepted edit cancels the pending write and schedules a new one
//! `quiet_interval` later, so a burst of typing produces a single write
//! carrying the last text. At most one write is pending at a time.
//!
//! Once the timer fires, the task detaches itself from the coordinator
//! before writing. From then on the write is committed: rebinding or a new
//! edit no longer affects it, and it always targets the diagram that was
//! bound when the edit arrived.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use mermpad_core::{DiagramId, DiagramPatch, DiagramRecord, Timestamp};
use mermpad_storage::{DiagramStore, StorageError};

/// An edit notification from the editor surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditEvent {
    /// The diagram the editor believed it was showing.
    pub binding: Option<DiagramId>,
    pub source_text: String,
}

impl EditEvent {
    pub fn new(binding: Option<DiagramId>, source_text: impl Into<String>) -> Self {
        EditEvent {
            binding,
            source_text: source_text.into(),
        }
    }
}

/// Observable autosave state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutosaveStatus {
    Idle,
    Pending { id: DiagramId },
    Saved { id: DiagramId, at: Timestamp },
    Failed { id: DiagramId, message: String },
}

struct PendingWrite {
    ticket: u64,
    id: DiagramId,
    source_text: String,
    handle: JoinHandle<()>,
}

#[derive(Default)]
struct AutosaveState {
    bound: Option<DiagramId>,
    pending: Option<PendingWrite>,
    next_ticket: u64,
}

impl AutosaveState {
    fn cancel(&mut self) -> Option<PendingWrite> {
        let pending = self.pending.take()?;
        pending.handle.abort();
        tracing::debug!("cancelled pending autosave for {}", pending.id);
        Some(pending)
    }
}

struct Shared {
    store: DiagramStore,
    quiet_interval: Duration,
    state: Mutex<AutosaveState>,
    status: watch::Sender<AutosaveStatus>,
}

impl Shared {
    fn state(&self) -> MutexGuard<'_, AutosaveState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn fire(self: Arc<Self>, ticket: u64, id: DiagramId, source_text: String) {
        tokio::time::sleep(self.quiet_interval).await;

        {
            let mut state = self.state();
            // Superseded between the timer firing and taking the lock.
            if state.pending.as_ref().map(|p| p.ticket) != Some(ticket) {
                return;
            }
            state.pending = None;
        }

        let status = match self
            .store
            .update(id, DiagramPatch::new().source_text(source_text))
            .await
        {
            Ok(record) => {
                tracing::debug!("autosaved diagram {}", id);
                AutosaveStatus::Saved {
                    id,
                    at: record.updated_at,
                }
            }
            Err(err) => {
                tracing::error!("autosave of diagram {} failed: {}", id, err);
                AutosaveStatus::Failed {
                    id,
                    message: err.to_string(),
                }
            }
        };

        // A later edit or rebind owns the status now.
        let state = self.state();
        if state.next_ticket == ticket {
            self.status.send_replace(status);
        }
    }
}

/// Coalesces edits into delayed writes against the bound diagram.
///
/// Cloning is cheap and every clone drives the same coordinator.
#[derive(Clone)]
pub struct AutosaveCoordinator {
    shared: Arc<Shared>,
}

impl AutosaveCoordinator {
    /// Must be created inside a tokio runtime; edits spawn timer tasks.
    pub fn new(store: DiagramStore, quiet_interval: Duration) -> Self {
        let (status, _) = watch::channel(AutosaveStatus::Idle);
        AutosaveCoordinator {
            shared: Arc::new(Shared {
                store,
                quiet_interval,
                state: Mutex::new(AutosaveState::default()),
                status,
            }),
        }
    }

    pub fn quiet_interval(&self) -> Duration {
        self.shared.quiet_interval
    }

    /// The diagram currently bound, if any.
    pub fn bound(&self) -> Option<DiagramId> {
        self.shared.state().bound
    }

    /// Changes the bound diagram, cancelling any pending write. Binding the
    /// diagram that is already bound changes nothing.
    pub fn bind(&self, id: Option<DiagramId>) {
        let mut state = self.shared.state();
        if state.bound == id {
            return;
        }
        state.cancel();
        state.bound = id;
        state.next_ticket += 1;
        drop(state);
        self.shared.status.send_replace(AutosaveStatus::Idle);
    }

    /// Text waiting to be written to `id`, if a write is pending for it.
    pub fn pending_text(&self, id: DiagramId) -> Option<String> {
        self.shared
            .state()
            .pending
            .as_ref()
            .filter(|p| p.id == id)
            .map(|p| p.source_text.clone())
    }

    /// Schedules a write for `event`. Returns false when the event was
    /// dropped: nothing is bound, or it was produced under another binding.
    pub fn on_edit(&self, event: EditEvent) -> bool {
        let mut state = self.shared.state();
        let Some(id) = state.bound else {
            return false;
        };
        if event.binding != Some(id) {
            tracing::debug!("dropping edit for stale binding {:?}", event.binding);
            return false;
        }

        state.cancel();
        state.next_ticket += 1;
        let ticket = state.next_ticket;

        let shared = Arc::clone(&self.shared);
        let text = event.source_text.clone();
        let handle = tokio::spawn(async move {
            shared.fire(ticket, id, text).await;
        });
        state.pending = Some(PendingWrite {
            ticket,
            id,
            source_text: event.source_text,
            handle,
        });
        drop(state);

        self.shared
            .status
            .send_replace(AutosaveStatus::Pending { id });
        true
    }

    /// Drops the pending write, if any, without writing.
    pub fn cancel_pending(&self) -> bool {
        let cancelled = self.shared.state().cancel().is_some();
        if cancelled {
            self.shared.status.send_replace(AutosaveStatus::Idle);
        }
        cancelled
    }

    pub fn has_pending(&self) -> bool {
        self.shared.state().pending.is_some()
    }

    /// Writes the pending text immediately instead of waiting out the quiet
    /// interval. Returns `Ok(None)` when nothing was pending.
    pub async fn flush(&self) -> Result<Option<DiagramRecord>, StorageError> {
        let Some(pending) = self.shared.state().cancel() else {
            return Ok(None);
        };
        let result = self
            .shared
            .store
            .update(pending.id, DiagramPatch::new().source_text(pending.source_text))
            .await;
        match &result {
            Ok(record) => self.shared.status.send_replace(AutosaveStatus::Saved {
                id: pending.id,
                at: record.updated_at,
            }),
            Err(err) => self.shared.status.send_replace(AutosaveStatus::Failed {
                id: pending.id,
                message: err.to_string(),
            }),
        };
        result.map(Some)
    }

    pub fn status(&self) -> AutosaveStatus {
        self.shared.status.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<AutosaveStatus> {
        self.shared.status.subscribe()
    }
}

impl std::fmt::Debug for AutosaveCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AutosaveCoordinator")
            .field("quiet_interval", &self.shared.quiet_interval)
            .field("bound", &self.bound())
            .field("pending", &self.has_pending())
            .finish()
    }
}
