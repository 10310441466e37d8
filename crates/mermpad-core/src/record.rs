//! The diagram record and the partial-update patch applied to it.
//!
//! [`DiagramRecord`] is the only persisted entity. Mutations never replace a
//! record wholesale: callers describe the fields they want changed with a
//! [`DiagramPatch`], and [`DiagramRecord::apply`] merges it over the current
//! state and re-stamps `updated_at`.

use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::id::DiagramId;

/// Zoom level assumed for records that predate the `viewZoomPercent` field.
pub const DEFAULT_ZOOM_PERCENT: u32 = 100;

/// Milliseconds since the Unix epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(pub i64);

impl Timestamp {
    /// Reads the wall clock.
    pub fn now() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);
        Timestamp(millis)
    }

    /// Returns a stamp strictly later than `previous`, preferring `self`.
    ///
    /// Two mutations inside the same millisecond still produce increasing
    /// stamps, and a wall clock that stepped backwards never makes a record
    /// look older than it was.
    pub fn after(self, previous: Timestamp) -> Timestamp {
        if self > previous {
            self
        } else {
            Timestamp(previous.0.saturating_add(1))
        }
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}ms", self.0)
    }
}

/// Validated, trimmed diagram label.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DiagramName(String);

impl DiagramName {
    /// Trims `raw` and rejects it if nothing remains.
    pub fn new(raw: &str) -> Result<Self, CoreError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CoreError::EmptyName);
        }
        Ok(DiagramName(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for DiagramName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One persisted diagram.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramRecord {
    /// Store-assigned identity. Never changes.
    pub id: DiagramId,
    /// Human-readable label, not required to be unique.
    pub name: String,
    /// The diagram's textual definition.
    pub source_text: String,
    /// Last-used zoom level. Absent on records that never set one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_zoom_percent: Option<u32>,
    /// Set once at creation.
    pub created_at: Timestamp,
    /// Re-stamped on every successful mutation.
    pub updated_at: Timestamp,
}

impl DiagramRecord {
    /// Builds a freshly created record with `created_at == updated_at`.
    pub fn new(id: DiagramId, name: &str, source_text: &str, now: Timestamp) -> Self {
        DiagramRecord {
            id,
            name: name.to_string(),
            source_text: source_text.to_string(),
            view_zoom_percent: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Zoom level to display, falling back to [`DEFAULT_ZOOM_PERCENT`].
    pub fn zoom_percent(&self) -> u32 {
        self.view_zoom_percent.unwrap_or(DEFAULT_ZOOM_PERCENT)
    }

    /// Merges `patch` over this record and re-stamps `updated_at`.
    ///
    /// Fields absent from the patch are left untouched. The identity and
    /// creation stamp are not patchable. An empty patch still advances
    /// `updated_at`.
    pub fn apply(&mut self, patch: &DiagramPatch, now: Timestamp) {
        if let Some(name) = &patch.name {
            self.name = name.clone();
        }
        if let Some(source_text) = &patch.source_text {
            self.source_text = source_text.clone();
        }
        if let Some(zoom) = patch.view_zoom_percent {
            self.view_zoom_percent = Some(zoom);
        }
        self.updated_at = now.after(self.updated_at);
    }
}

/// Partial update of a [`DiagramRecord`].
///
/// Deserializing a patch silently ignores unknown keys, so a client that
/// sends `id`, `createdAt` or `updatedAt` cannot overwrite them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagramPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_zoom_percent: Option<u32>,
}

impl DiagramPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn source_text(mut self, source_text: impl Into<String>) -> Self {
        self.source_text = Some(source_text.into());
        self
    }

    pub fn view_zoom_percent(mut self, zoom: u32) -> Self {
        self.view_zoom_percent = Some(zoom);
        self
    }

    /// True if applying this patch would change nothing but `updated_at`.
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.source_text.is_none() && self.view_zoom_percent.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample(now: i64) -> DiagramRecord {
        DiagramRecord::new(
            DiagramId::generate(),
            "Flow",
            "graph TD\n A-->B",
            Timestamp(now),
        )
    }

    #[test]
    fn new_record_has_equal_stamps_and_no_zoom() {
        let record = sample(1_000);
        assert_eq!(record.created_at, record.updated_at);
        assert_eq!(record.view_zoom_percent, None);
        assert_eq!(record.zoom_percent(), DEFAULT_ZOOM_PERCENT);
    }

    #[test]
    fn after_saturates_at_max_stamp() {
        let corrupt = Timestamp(i64::MAX);
        assert_eq!(Timestamp(0).after(corrupt), corrupt);
    }

    #[test]
    fn apply_name_only_preserves_source() {
        let mut record = sample(1_000);
        record.apply(&DiagramPatch::new().name("Renamed"), Timestamp(2_000));
        assert_eq!(record.name, "Renamed");
        assert_eq!(record.source_text, "graph TD\n A-->B");
        assert_eq!(record.updated_at, Timestamp(2_000));
        assert_eq!(record.created_at, Timestamp(1_000));
    }

    #[test]
    fn empty_patch_still_advances_updated_at() {
        let mut record = sample(1_000);
        record.apply(&DiagramPatch::new(), Timestamp(1_000));
        assert_eq!(record.updated_at, Timestamp(1_001));
        record.apply(&DiagramPatch::new(), Timestamp(1_000));
        assert_eq!(record.updated_at, Timestamp(1_002));
        assert_eq!(record.name, "Flow");
    }

    #[test]
    fn backwards_clock_never_decreases_updated_at() {
        let mut record = sample(5_000);
        record.apply(&DiagramPatch::new().source_text("x"), Timestamp(10));
        assert!(record.updated_at > Timestamp(5_000));
    }

    #[test]
    fn patch_ignores_identity_fields() {
        let patch: DiagramPatch = serde_json::from_str(
            r#"{"id":"00000000-0000-0000-0000-000000000000","name":"n","createdAt":0}"#,
        )
        .unwrap();
        assert_eq!(patch, DiagramPatch::new().name("n"));
    }

    #[test]
    fn record_serializes_camel_case_without_absent_zoom() {
        let record = sample(7);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["sourceText"], "graph TD\n A-->B");
        assert_eq!(json["createdAt"], 7);
        assert!(json.get("viewZoomPercent").is_none());
    }

    #[test]
    fn name_is_trimmed_and_rejected_when_blank() {
        assert_eq!(DiagramName::new("  Flow \n").unwrap().as_str(), "Flow");
        assert_eq!(DiagramName::new("   "), Err(CoreError::EmptyName));
    }

    proptest! {
        #[test]
        fn updated_at_never_precedes_created_at(
            created in 0i64..1_000_000,
            stamps in proptest::collection::vec(0i64..2_000_000, 0..20),
        ) {
            let mut record = sample(created);
            for stamp in stamps {
                let before = record.updated_at;
                record.apply(&DiagramPatch::new(), Timestamp(stamp));
                prop_assert!(record.updated_at > before);
                prop_assert!(record.updated_at >= record.created_at);
            }
        }
    }
}
