//! Session configuration.
//!
//! Everything has a default, so an embedder only sets what it cares about.
//! There is no environment lookup: the editor is entirely client-local and
//! the host application hands the configuration in.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use mermpad_storage::DiagramStore;

use crate::error::SessionError;

/// Source given to a diagram created from the sidebar.
pub const NEW_DIAGRAM_SOURCE: &str = "graph TD\n    A[Start] --> B[End]";

/// Source shown when no diagram is selected.
pub const DRAFT_SOURCE: &str = "graph TD
    A[Start] --> B{Is it working?}
    B -->|Yes| C[Great!]
    B -->|No| D[Debug]
    D --> B
    C --> E[End]";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Directory holding the SQLite store. `None` keeps everything in memory.
    pub data_dir: Option<PathBuf>,
    /// Quiet period after the last edit before autosave writes.
    pub quiet_interval_ms: u64,
    pub new_diagram_source: String,
    pub draft_source: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            data_dir: None,
            quiet_interval_ms: 1_000,
            new_diagram_source: NEW_DIAGRAM_SOURCE.to_string(),
            draft_source: DRAFT_SOURCE.to_string(),
        }
    }
}

impl SessionConfig {
    /// Parses a JSON configuration; missing keys take their defaults.
    pub fn from_json(json: &str) -> Result<Self, SessionError> {
        serde_json::from_str(json).map_err(|e| SessionError::Config(e.to_string()))
    }

    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms)
    }

    /// Builds the (uninitialized) store this configuration points at.
    pub fn store(&self) -> DiagramStore {
        match &self.data_dir {
            Some(dir) => DiagramStore::sqlite_in_dir(dir),
            None => DiagramStore::in_memory(),
        }
    }
}
