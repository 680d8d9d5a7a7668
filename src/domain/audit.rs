//! Audit log entries.
//!
//! Every task keeps a single ordered log of encoded strings. This module
//! holds the typed view of those strings; encoding and decoding live in
//! `core::audit_codec`.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::template::ValueMap;

/// Tag of a stage payload entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StageTag {
    CheckIn,
    CheckOut,
}

impl StageTag {
    /// Prefix used in the encoded log
    pub fn prefix(&self) -> &'static str {
        match self {
            StageTag::CheckIn => "CHECKIN:",
            StageTag::CheckOut => "CHECKOUT:",
        }
    }
}

impl fmt::Display for StageTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.prefix().trim_end_matches(':'))
    }
}

/// Structured data recorded when crossing the intake or outtake boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageRecord {
    /// Free-form legacy field, kept for older tasks
    #[serde(default)]
    pub belongings: String,

    /// Free-form legacy field, kept for older tasks
    #[serde(default)]
    pub analysis: String,

    /// Free-form legacy field, kept for older tasks
    #[serde(default)]
    pub grooming_notes: String,

    /// Values collected against the active template
    #[serde(default)]
    pub dynamic_values: ValueMap,

    /// Photo references
    #[serde(default)]
    pub photos: Vec<String>,

    /// Template the values were collected with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_name: Option<String>,
}

/// Typed view of one log entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuditEntry {
    /// Execution clock started
    TimerStart(DateTime<Utc>),

    /// Intake or outtake payload
    StagePayload { tag: StageTag, record: StageRecord },

    /// Legacy untagged checklist item id
    ChecklistItem(String),

    /// Tagged entry whose body could not be parsed
    Unreadable { raw: String },
}

impl AuditEntry {
    pub fn is_timer(&self) -> bool {
        matches!(self, AuditEntry::TimerStart(_))
    }

    pub fn stage_tag(&self) -> Option<StageTag> {
        match self {
            AuditEntry::StagePayload { tag, .. } => Some(*tag),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_record_legacy_field_names() {
        let json = r#"{"belongings":"leash","groomingNotes":"short cut","photos":["a.jpg"]}"#;
        let record: StageRecord = serde_json::from_str(json).unwrap();

        assert_eq!(record.belongings, "leash");
        assert_eq!(record.grooming_notes, "short cut");
        assert_eq!(record.analysis, "");
        assert!(record.dynamic_values.is_empty());
        assert!(record.template_name.is_none());
    }

    #[test]
    fn test_stage_tag_display() {
        assert_eq!(StageTag::CheckIn.to_string(), "CHECKIN");
        assert_eq!(StageTag::CheckOut.prefix(), "CHECKOUT:");
    }
}
