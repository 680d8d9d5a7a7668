//! Codec for the task audit log.
//!
//! The log is a single ordered sequence of strings shared by three kinds of
//! entries:
//! - `TIMER:<rfc3339>` marks the start of the execution clock
//! - `CHECKIN:<json>` / `CHECKOUT:<json>` carry stage payloads
//! - anything else is a legacy checklist item id
//!
//! Decoding by tag returns the first matching entry. Logs written by older
//! clients depend on that, so later duplicates stay invisible to readers.

use chrono::{DateTime, SecondsFormat, Utc};
use tracing::warn;

use crate::domain::{AuditEntry, StageRecord, StageTag};

/// Prefix of timer entries
pub const TIMER_PREFIX: &str = "TIMER:";

/// Encode a timer start entry
pub fn encode_timer_start(at: DateTime<Utc>) -> String {
    format!("{}{}", TIMER_PREFIX, at.to_rfc3339_opts(SecondsFormat::Millis, true))
}

/// Encode a stage payload entry
pub fn encode_stage_payload(
    tag: StageTag,
    record: &StageRecord,
) -> Result<String, serde_json::Error> {
    let body = serde_json::to_string(record)?;
    Ok(format!("{}{}", tag.prefix(), body))
}

/// Encode any typed entry back to its log form
pub fn encode_entry(entry: &AuditEntry) -> Result<String, serde_json::Error> {
    Ok(match entry {
        AuditEntry::TimerStart(at) => encode_timer_start(*at),
        AuditEntry::StagePayload { tag, record } => encode_stage_payload(*tag, record)?,
        AuditEntry::ChecklistItem(id) => id.clone(),
        AuditEntry::Unreadable { raw } => raw.clone(),
    })
}

/// Parse a single raw entry
pub fn parse_entry(raw: &str) -> AuditEntry {
    if let Some(ts) = raw.strip_prefix(TIMER_PREFIX) {
        return match DateTime::parse_from_rfc3339(ts) {
            Ok(at) => AuditEntry::TimerStart(at.with_timezone(&Utc)),
            Err(e) => {
                warn!(entry = %raw, error = %e, "Unreadable timer entry");
                AuditEntry::Unreadable {
                    raw: raw.to_string(),
                }
            }
        };
    }

    for tag in [StageTag::CheckIn, StageTag::CheckOut] {
        if let Some(body) = raw.strip_prefix(tag.prefix()) {
            return match serde_json::from_str::<StageRecord>(body) {
                Ok(record) => AuditEntry::StagePayload { tag, record },
                Err(e) => {
                    warn!(%tag, error = %e, "Unreadable stage payload entry");
                    AuditEntry::Unreadable {
                        raw: raw.to_string(),
                    }
                }
            };
        }
    }

    AuditEntry::ChecklistItem(raw.to_string())
}

/// Typed view of a whole log, in order
pub fn entries(log: &[String]) -> Vec<AuditEntry> {
    log.iter().map(|raw| parse_entry(raw)).collect()
}

/// Whether a raw entry starts with one of the reserved tags
pub fn is_tagged(raw: &str) -> bool {
    raw.starts_with(TIMER_PREFIX)
        || raw.starts_with(StageTag::CheckIn.prefix())
        || raw.starts_with(StageTag::CheckOut.prefix())
}

/// First stage payload with the given tag, if any
pub fn decode(log: &[String], tag: StageTag) -> Option<StageRecord> {
    let raw = log.iter().find(|raw| raw.starts_with(tag.prefix()))?;
    match parse_entry(raw) {
        AuditEntry::StagePayload { record, .. } => Some(record),
        _ => None,
    }
}

/// When the execution clock started (first timer entry)
pub fn timer_started_at(log: &[String]) -> Option<DateTime<Utc>> {
    let raw = log.iter().find(|raw| raw.starts_with(TIMER_PREFIX))?;
    match parse_entry(raw) {
        AuditEntry::TimerStart(at) => Some(at),
        _ => None,
    }
}

/// Whether the log already holds a timer entry
pub fn has_timer(log: &[String]) -> bool {
    log.iter().any(|raw| raw.starts_with(TIMER_PREFIX))
}

/// Number of entries carrying the given stage tag
pub fn count_tagged(log: &[String], tag: StageTag) -> usize {
    log.iter().filter(|raw| raw.starts_with(tag.prefix())).count()
}

/// Legacy checklist ids checked so far, in log order
pub fn checked_items(log: &[String]) -> Vec<&str> {
    log.iter()
        .map(String::as_str)
        .filter(|raw| !is_tagged(raw))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::FieldValue;
    use chrono::TimeZone;

    fn record(notes: &str) -> StageRecord {
        let mut record = StageRecord {
            belongings: "red leash".to_string(),
            grooming_notes: notes.to_string(),
            photos: vec!["https://cdn/p/1.jpg".to_string()],
            template_name: Some("bath-intake".to_string()),
            ..Default::default()
        };
        record
            .dynamic_values
            .insert("knots".to_string(), FieldValue::Bool(true));
        record
    }

    #[test]
    fn test_timer_encoding() {
        let at = Utc.with_ymd_and_hms(2026, 3, 14, 9, 30, 0).unwrap();
        let raw = encode_timer_start(at);

        assert_eq!(raw, "TIMER:2026-03-14T09:30:00.000Z");
        assert_eq!(parse_entry(&raw), AuditEntry::TimerStart(at));
    }

    #[test]
    fn test_stage_payload_round_trip() {
        let original = record("short cut");
        let raw = encode_stage_payload(StageTag::CheckIn, &original).unwrap();

        assert!(raw.starts_with("CHECKIN:{"));
        let log = vec![raw.clone()];
        let decoded = decode(&log, StageTag::CheckIn).unwrap();
        assert_eq!(decoded, original);
        assert_eq!(encode_stage_payload(StageTag::CheckIn, &decoded).unwrap(), raw);
    }

    #[test]
    fn test_decode_first_match_wins() {
        let log = vec![
            "brush-teeth".to_string(),
            encode_stage_payload(StageTag::CheckIn, &record("first")).unwrap(),
            encode_stage_payload(StageTag::CheckIn, &record("second")).unwrap(),
        ];

        let decoded = decode(&log, StageTag::CheckIn).unwrap();
        assert_eq!(decoded.grooming_notes, "first");
        assert!(decode(&log, StageTag::CheckOut).is_none());
        assert_eq!(count_tagged(&log, StageTag::CheckIn), 2);
    }

    #[test]
    fn test_checked_items_skip_tagged_entries() {
        let log = vec![
            "nails".to_string(),
            encode_timer_start(Utc::now()),
            encode_stage_payload(StageTag::CheckOut, &StageRecord::default()).unwrap(),
            "ears".to_string(),
        ];

        assert_eq!(checked_items(&log), vec!["nails", "ears"]);
    }

    #[test]
    fn test_unreadable_entries_do_not_panic() {
        let log = vec!["CHECKIN:{not json".to_string(), "TIMER:yesterday".to_string()];

        assert!(decode(&log, StageTag::CheckIn).is_none());
        assert!(timer_started_at(&log).is_none());
        assert!(has_timer(&log));
        assert!(checked_items(&log).is_empty());
        assert!(matches!(entries(&log)[0], AuditEntry::Unreadable { .. }));
    }

    #[test]
    fn test_encode_entry_matches_source_strings() {
        let log = vec![
            "nails".to_string(),
            encode_timer_start(Utc.with_ymd_and_hms(2026, 1, 2, 3, 4, 5).unwrap()),
            encode_stage_payload(StageTag::CheckIn, &record("x")).unwrap(),
        ];

        let reencoded: Vec<String> = entries(&log)
            .iter()
            .map(|e| encode_entry(e).unwrap())
            .collect();
        assert_eq!(reencoded, log);
    }
}
