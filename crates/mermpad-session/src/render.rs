//! Preview rendering against an external diagram renderer.
//!
//! The renderer itself is opaque. Whatever it does, the preview pane gets a
//! [`PreviewContent`] value back: a render failure, or even a panic inside
//! the renderer, becomes inline error content rather than an error return.

use std::panic::{catch_unwind, AssertUnwindSafe};

/// The renderer rejected the source text.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RenderFailure {
    pub message: String,
}

impl RenderFailure {
    pub fn new(message: impl Into<String>) -> Self {
        RenderFailure {
            message: message.into(),
        }
    }
}

/// Turns diagram source text into graphic markup.
pub trait DiagramRenderer: Send + Sync {
    fn render(&self, source: &str) -> Result<String, RenderFailure>;
}

impl<F> DiagramRenderer for F
where
    F: Fn(&str) -> Result<String, RenderFailure> + Send + Sync,
{
    fn render(&self, source: &str) -> Result<String, RenderFailure> {
        self(source)
    }
}

/// What the preview pane displays.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreviewContent {
    /// Nothing to render (blank source).
    Empty,
    /// Rendered markup.
    Graphic(String),
    /// Inline error message.
    Error(String),
}

/// Renders `source` for the preview pane.
pub fn render_preview(renderer: &dyn DiagramRenderer, source: &str) -> PreviewContent {
    if source.trim().is_empty() {
        return PreviewContent::Empty;
    }
    match catch_unwind(AssertUnwindSafe(|| renderer.render(source))) {
        Ok(Ok(markup)) => PreviewContent::Graphic(markup),
        Ok(Err(failure)) => {
            tracing::debug!("render failed: {}", failure);
            PreviewContent::Error(format!("Error rendering diagram: {}", failure.message))
        }
        Err(_) => {
            tracing::warn!("renderer panicked");
            PreviewContent::Error("Error rendering diagram: Unknown error".to_string())
        }
    }
}
