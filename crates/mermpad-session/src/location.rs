//! The navigable location that carries the current diagram reference.

use std::sync::{Arc, Mutex, PoisonError};

/// Where the current diagram reference lives (a URL fragment, a route, ...).
///
/// The token is opaque here; the bridge decides whether it names a diagram.
pub trait Location: Send + Sync {
    /// The reference token, if any.
    fn current(&self) -> Option<String>;

    /// Navigates to `token`, adding a history entry.
    fn push(&self, token: &str);

    /// Rewrites the current entry without adding history.
    fn replace(&self, token: Option<&str>);
}

#[derive(Debug, Default)]
struct LocationState {
    current: Option<String>,
    history: Vec<Option<String>>,
}

/// In-process [`Location`] with a visible history, for headless embedding
/// and tests.
#[derive(Debug, Clone, Default)]
pub struct MemoryLocation {
    state: Arc<Mutex<LocationState>>,
}

impl MemoryLocation {
    pub fn new() -> Self {
        Self::default()
    }

    /// A location already pointing at `token`.
    pub fn at(token: &str) -> Self {
        let location = Self::new();
        location.push(token);
        location
    }

    /// Every entry pushed so far, oldest first. Replacements overwrite the
    /// last entry.
    pub fn history(&self) -> Vec<Option<String>> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .history
            .clone()
    }
}

impl Location for MemoryLocation {
    fn current(&self) -> Option<String> {
        self.state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .current
            .clone()
    }

    fn push(&self, token: &str) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        state.current = Some(token.to_string());
        state.history.push(Some(token.to_string()));
    }

    fn replace(&self, token: Option<&str>) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let token = token.map(str::to_string);
        state.current = token.clone();
        match state.history.last_mut() {
            Some(last) => *last = token,
            None => state.history.push(token),
        }
    }
}
