//! Schema Engine Integration Tests
//!
//! Template snapshots are copies: editing the catalog after a task is
//! created never reaches that task.

mod common;

use common::{appointment, Harness};
use groomtrack::core::{audit_codec, schema, AdvanceRequest, StagePayloadInput, WorkflowError};
use groomtrack::domain::{
    ChecklistTemplate, Field, FieldType, FieldValue, Section, SizeTier, StageTag, ValueMap,
};

fn edited_intake() -> ChecklistTemplate {
    ChecklistTemplate {
        name: "groom-intake".to_string(),
        sections: vec![Section {
            title: "Temperament".to_string(),
            fields: vec![Field::new("temper", "Temper", FieldType::Choice)
                .with_choices(["calm", "anxious"])
                .required()],
        }],
    }
}

#[tokio::test]
async fn test_template_edit_after_snapshot_leaves_task_unchanged() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let task = orchestrator
        .create_task(&appointment("full-groom", SizeTier::Small))
        .await
        .unwrap();
    let snapshot_before = task.intake_template.clone().unwrap();

    harness.catalog.upsert_template(edited_intake()).await.unwrap();

    let stored = orchestrator.get_task(task.id).await.unwrap();
    assert_eq!(stored.intake_template.as_ref(), Some(&snapshot_before));
    assert!(snapshot_before.template.field("knots").is_some());
    assert!(snapshot_before.template.field("temper").is_none());

    // Values are still coerced against the original fields
    let mut values = ValueMap::new();
    values.insert("knots".to_string(), FieldValue::from("yes"));
    values.insert("temper".to_string(), FieldValue::from("calm"));

    let outcome = orchestrator
        .advance(
            task.id,
            AdvanceRequest {
                stage_payload: Some(StagePayloadInput {
                    values,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let checkin = audit_codec::decode(&outcome.task.audit_log, StageTag::CheckIn).unwrap();
    assert_eq!(checkin.dynamic_values["knots"], FieldValue::Bool(true));
    assert!(!checkin.dynamic_values.contains_key("temper"));

    // New tasks pick up the edit
    let fresh = orchestrator
        .create_task(&appointment("full-groom", SizeTier::Small))
        .await
        .unwrap();
    let fresh_snapshot = fresh.intake_template.unwrap();
    assert!(fresh_snapshot.template.field("temper").is_some());
    assert_eq!(fresh_snapshot.defaults["temper"], FieldValue::from("calm"));
}

#[tokio::test]
async fn test_invalid_template_edit_is_rejected() {
    let harness = Harness::new();
    let mut broken = edited_intake();
    broken.sections[0].fields[0].choices.clear();

    assert!(harness.catalog.upsert_template(broken).await.is_err());

    let catalog = harness.catalog.snapshot().await;
    assert!(catalog.template("groom-intake").unwrap().field("knots").is_some());
}

#[tokio::test]
async fn test_type_mismatch_surfaces_as_schema_error() {
    let harness = Harness::new();
    let orchestrator = harness.orchestrator();
    let task = orchestrator
        .create_task(&appointment("full-groom", SizeTier::Small))
        .await
        .unwrap();

    let mut values = ValueMap::new();
    values.insert("before".to_string(), FieldValue::Bool(true));

    let err = orchestrator
        .advance(
            task.id,
            AdvanceRequest {
                stage_payload: Some(StagePayloadInput {
                    values,
                    ..Default::default()
                }),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        WorkflowError::Schema(schema::SchemaViolation::TypeMismatch { .. })
    ));
}

#[test]
fn test_snapshot_survives_json_round_trip() {
    let snap = schema::snapshot(&edited_intake());

    let json = serde_json::to_string(&snap).unwrap();
    let back: groomtrack::domain::TemplateSnapshot = serde_json::from_str(&json).unwrap();

    assert_eq!(back, snap);
    assert_eq!(schema::missing_required(&back, &back.defaults), Vec::<String>::new());
}
