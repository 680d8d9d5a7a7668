//! Service tasks: one in-flight execution of a service for a pet.

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::commerce::{SizeTier, UsedProduct};
use super::template::TemplateSnapshot;

/// Operational stage of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum StageKey {
    /// Checked in, waiting to start
    Waiting,

    /// Service being performed
    InProgress,

    /// Post-service inspection (categories with an outtake stage only)
    Outtake,

    /// Ready for pickup
    Ready,

    /// Delivered and paid; never part of a step list
    Finished,
}

impl fmt::Display for StageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageKey::Waiting => write!(f, "waiting"),
            StageKey::InProgress => write!(f, "in-progress"),
            StageKey::Outtake => write!(f, "outtake"),
            StageKey::Ready => write!(f, "ready"),
            StageKey::Finished => write!(f, "finished"),
        }
    }
}

/// A labelled step in a task's fixed progression
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageStep {
    pub label: String,
    pub key: StageKey,
}

impl StageStep {
    pub fn new(label: impl Into<String>, key: StageKey) -> Self {
        Self {
            label: label.into(),
            key,
        }
    }
}

/// A simple execution step tracked by a single checked flag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChecklistItem {
    pub id: String,
    pub text: String,
}

/// A scheduled appointment, the input to task creation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: String,
    pub pet_id: String,
    pub owner_id: String,
    pub service_id: String,
    pub size_tier: SizeTier,
    pub scheduled_at: DateTime<Utc>,
}

/// One in-flight execution of a service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceTask {
    pub id: Uuid,
    pub appointment_id: String,
    pub pet_id: String,
    pub owner_id: String,
    pub service_id: String,
    pub size_tier: SizeTier,

    /// Price for the size tier, captured at creation
    pub base_price: Decimal,

    /// Expected duration for SLA display; not enforced
    pub duration_minutes: u32,

    /// Fixed at creation from the service category
    pub stage_steps: Vec<StageStep>,

    pub current_step_index: usize,

    pub status: StageKey,

    /// Encoded entries; append-only
    #[serde(default)]
    pub audit_log: Vec<String>,

    pub intake_template: Option<TemplateSnapshot>,
    pub outtake_template: Option<TemplateSnapshot>,

    #[serde(default)]
    pub used_products: BTreeMap<String, UsedProduct>,

    #[serde(default)]
    pub checklist_items: Vec<ChecklistItem>,

    pub created_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
}

impl ServiceTask {
    /// The step the task currently sits on
    pub fn current_step(&self) -> Option<&StageStep> {
        self.stage_steps.get(self.current_step_index)
    }

    pub fn is_last_step(&self) -> bool {
        self.current_step_index + 1 == self.stage_steps.len()
    }

    pub fn is_finished(&self) -> bool {
        self.status == StageKey::Finished
    }

    /// Whether index and status agree with the step list.
    ///
    /// A finished task keeps its index on the last step.
    pub fn is_consistent(&self) -> bool {
        match self.current_step() {
            None => false,
            Some(_) if self.status == StageKey::Finished => self.is_last_step(),
            Some(step) => step.key == self.status,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task_with_steps(steps: Vec<StageStep>, index: usize, status: StageKey) -> ServiceTask {
        ServiceTask {
            id: Uuid::new_v4(),
            appointment_id: "appt-1".to_string(),
            pet_id: "pet-1".to_string(),
            owner_id: "owner-1".to_string(),
            service_id: "bath".to_string(),
            size_tier: SizeTier::Small,
            base_price: Decimal::from(50),
            duration_minutes: 60,
            stage_steps: steps,
            current_step_index: index,
            status,
            audit_log: Vec::new(),
            intake_template: None,
            outtake_template: None,
            used_products: BTreeMap::new(),
            checklist_items: Vec::new(),
            created_at: Utc::now(),
            finished_at: None,
        }
    }

    fn three_steps() -> Vec<StageStep> {
        vec![
            StageStep::new("Check-in", StageKey::Waiting),
            StageStep::new("In progress", StageKey::InProgress),
            StageStep::new("Ready for pickup", StageKey::Ready),
        ]
    }

    #[test]
    fn test_stage_key_serialization() {
        let json = serde_json::to_string(&StageKey::InProgress).unwrap();
        assert_eq!(json, "\"in-progress\"");
        assert_eq!(StageKey::InProgress.to_string(), "in-progress");
    }

    #[test]
    fn test_consistency_checks() {
        assert!(task_with_steps(three_steps(), 0, StageKey::Waiting).is_consistent());
        assert!(!task_with_steps(three_steps(), 0, StageKey::Ready).is_consistent());
        assert!(!task_with_steps(three_steps(), 3, StageKey::Ready).is_consistent());
        assert!(!task_with_steps(Vec::new(), 0, StageKey::Waiting).is_consistent());
    }

    #[test]
    fn test_finished_task_parks_on_last_step() {
        assert!(task_with_steps(three_steps(), 2, StageKey::Finished).is_consistent());
        assert!(!task_with_steps(three_steps(), 1, StageKey::Finished).is_consistent());
    }
}
