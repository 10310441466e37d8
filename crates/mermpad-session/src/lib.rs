//! Editor session for mermpad.
//!
//! Wires the diagram store to the editor surface:
//!
//! - [`autosave`]: debounced writes of the bound diagram's source text
//! - [`bridge`]: keeps the navigable location, the autosave binding and the
//!   editor contents in agreement
//! - [`sidebar`]: the stored diagrams, most recently updated first
//! - [`render`]: preview content from an external renderer
//! - [`session`]: [`EditorSession`], which owns all of the above

pub mod autosave;
pub mod bridge;
pub mod config;
pub mod error;
pub mod location;
pub mod render;
pub mod session;
pub mod sidebar;

pub use autosave::{AutosaveCoordinator, AutosaveStatus, EditEvent};
pub use bridge::{Resolution, SelectionBridge, Templates};
pub use config::SessionConfig;
pub use error::SessionError;
pub use location::{Location, MemoryLocation};
pub use render::{render_preview, DiagramRenderer, PreviewContent, RenderFailure};
pub use session::{init_tracing, EditorDocument, EditorSession};
pub use sidebar::{DiagramListing, SidebarEntry};
