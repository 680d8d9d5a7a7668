//! Execution clock readings for duration displays.
//!
//! The clock starts at the task's timer entry. Expected duration is
//! informational; nothing is enforced.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::ServiceTask;

use super::audit_codec;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SlaReading {
    pub started_at: DateTime<Utc>,
    pub elapsed_minutes: i64,
    pub expected_minutes: u32,
    pub overdue: bool,
}

/// Read the execution clock as of `now`; `None` until the timer starts.
///
/// Finished tasks stop the clock at their finish time.
pub fn reading(task: &ServiceTask, now: DateTime<Utc>) -> Option<SlaReading> {
    let started_at = audit_codec::timer_started_at(&task.audit_log)?;
    let until = task.finished_at.unwrap_or(now);
    let elapsed_minutes = (until - started_at).num_minutes().max(0);

    Some(SlaReading {
        started_at,
        elapsed_minutes,
        expected_minutes: task.duration_minutes,
        overdue: elapsed_minutes > i64::from(task.duration_minutes),
    })
}
