//! Audit Log Integration Tests
//!
//! Encoding, first-match decoding and legacy compatibility of the tagged
//! audit log.

use chrono::{TimeZone, Utc};

use groomtrack::core::audit_codec::{self, TIMER_PREFIX};
use groomtrack::domain::{AuditEntry, FieldValue, StageRecord, StageTag};

fn record(notes: &str) -> StageRecord {
    let mut record = StageRecord {
        belongings: "harness".to_string(),
        analysis: "skin ok".to_string(),
        grooming_notes: notes.to_string(),
        photos: vec!["https://cdn/p/1.jpg".to_string()],
        template_name: Some("groom-intake".to_string()),
        ..Default::default()
    };
    record
        .dynamic_values
        .insert("coat".to_string(), FieldValue::from("matted"));
    record
        .dynamic_values
        .insert("knots".to_string(), FieldValue::Bool(true));
    record
}

#[test]
fn test_mixed_log_decodes_in_order() {
    let at = Utc.with_ymd_and_hms(2026, 4, 2, 14, 5, 0).unwrap();
    let log = vec![
        "nails".to_string(),
        audit_codec::encode_stage_payload(StageTag::CheckIn, &record("short cut")).unwrap(),
        audit_codec::encode_timer_start(at),
        "ears".to_string(),
        audit_codec::encode_stage_payload(StageTag::CheckOut, &StageRecord::default()).unwrap(),
    ];

    let entries = audit_codec::entries(&log);
    assert_eq!(entries.len(), 5);
    assert_eq!(entries[0], AuditEntry::ChecklistItem("nails".to_string()));
    assert_eq!(entries[1].stage_tag(), Some(StageTag::CheckIn));
    assert!(entries[2].is_timer());
    assert_eq!(entries[4].stage_tag(), Some(StageTag::CheckOut));

    assert_eq!(audit_codec::checked_items(&log), vec!["nails", "ears"]);
    assert_eq!(audit_codec::timer_started_at(&log), Some(at));
    assert_eq!(
        audit_codec::decode(&log, StageTag::CheckIn),
        Some(record("short cut"))
    );

    let reencoded: Vec<String> = entries
        .iter()
        .map(|e| audit_codec::encode_entry(e).unwrap())
        .collect();
    assert_eq!(reencoded, log);
}

#[test]
fn test_decode_returns_first_match() {
    let log = vec![
        audit_codec::encode_stage_payload(StageTag::CheckIn, &record("first")).unwrap(),
        audit_codec::encode_stage_payload(StageTag::CheckIn, &record("second")).unwrap(),
    ];

    let decoded = audit_codec::decode(&log, StageTag::CheckIn).unwrap();
    assert_eq!(decoded.grooming_notes, "first");
    assert_eq!(audit_codec::count_tagged(&log, StageTag::CheckIn), 2);
    assert!(audit_codec::decode(&log, StageTag::CheckOut).is_none());
}

#[test]
fn test_unreadable_first_entry_hides_later_ones() {
    let log = vec![
        "CHECKOUT:{not json".to_string(),
        audit_codec::encode_stage_payload(StageTag::CheckOut, &record("valid")).unwrap(),
    ];

    assert!(audit_codec::decode(&log, StageTag::CheckOut).is_none());
    assert_eq!(
        audit_codec::parse_entry(&log[0]),
        AuditEntry::Unreadable { raw: log[0].clone() }
    );
}

#[test]
fn test_legacy_payload_with_missing_fields() {
    let log = vec![r#"CHECKIN:{"belongings":"bandana","groomingNotes":"calm"}"#.to_string()];

    let decoded = audit_codec::decode(&log, StageTag::CheckIn).unwrap();
    assert_eq!(decoded.belongings, "bandana");
    assert_eq!(decoded.grooming_notes, "calm");
    assert!(decoded.dynamic_values.is_empty());
    assert!(decoded.photos.is_empty());
    assert!(decoded.template_name.is_none());
}

#[test]
fn test_bad_timer_is_unreadable() {
    let log = vec![format!("{}yesterday", TIMER_PREFIX)];

    assert!(audit_codec::has_timer(&log));
    assert!(audit_codec::timer_started_at(&log).is_none());
    assert!(audit_codec::checked_items(&log).is_empty());
}

#[test]
fn test_tag_prefixes_are_reserved() {
    assert!(audit_codec::is_tagged("TIMER:2026-01-01T00:00:00Z"));
    assert!(audit_codec::is_tagged("CHECKIN:{}"));
    assert!(audit_codec::is_tagged("CHECKOUT:{}"));
    assert!(!audit_codec::is_tagged("checkin-photos"));
    assert!(!audit_codec::is_tagged("nails"));
}
