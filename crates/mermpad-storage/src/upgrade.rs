//! Record-level schema upgrade steps for document-oriented backends.
//!
//! Each [`UpgradeStep`] brings the collection from `version - 1` to
//! `version` by rewriting stored JSON documents in place. Steps only ever
//! fill in fields that are missing, so re-running a step over data it has
//! already upgraded changes nothing.

use serde_json::{Map, Value};

use mermpad_core::DEFAULT_ZOOM_PERCENT;

use crate::schema::SCHEMA_VERSION;

/// One version bump of the persisted layout.
#[derive(Debug, Clone, Copy)]
pub struct UpgradeStep {
    /// Version reached once this step has run.
    pub version: u32,
    pub description: &'static str,
    /// Rewrites one document. Returns true if it changed anything.
    pub backfill: fn(&mut Map<String, Value>) -> bool,
}

/// All upgrade steps, in strictly increasing version order.
pub static UPGRADE_STEPS: [UpgradeStep; SCHEMA_VERSION as usize] = [
    UpgradeStep {
        version: 1,
        description: "create diagrams collection with name/createdAt/updatedAt lookup paths",
        backfill: no_backfill,
    },
    UpgradeStep {
        version: 2,
        description: "add viewZoomPercent defaulting to 100",
        backfill: backfill_view_zoom,
    },
];

fn no_backfill(_: &mut Map<String, Value>) -> bool {
    false
}

fn backfill_view_zoom(doc: &mut Map<String, Value>) -> bool {
    match doc.get("viewZoomPercent") {
        Some(Value::Number(_)) => false,
        _ => {
            doc.insert(
                "viewZoomPercent".to_string(),
                Value::from(DEFAULT_ZOOM_PERCENT),
            );
            true
        }
    }
}

/// Steps that must run to bring a store at `from` up to date.
pub fn pending_steps(from: u32) -> impl Iterator<Item = &'static UpgradeStep> {
    UPGRADE_STEPS.iter().filter(move |step| step.version > from)
}

/// Runs every pending step over `documents`, in version order.
///
/// Returns the number of documents each step changed, keyed by the step's
/// version. Non-object documents are left alone.
pub fn upgrade_documents<'a, I>(documents: I, from: u32) -> Vec<(u32, usize)>
where
    I: IntoIterator<Item = &'a mut Value>,
{
    let mut documents: Vec<&mut Value> = documents.into_iter().collect();
    let mut changes = Vec::new();
    for step in pending_steps(from) {
        let mut changed = 0;
        for doc in documents.iter_mut() {
            if let Value::Object(map) = &mut **doc {
                if (step.backfill)(map) {
                    changed += 1;
                }
            }
        }
        changes.push((step.version, changed));
    }
    changes
}
