//! Stage controller.
//!
//! Pure transition logic over a task's fixed step list. No I/O happens here;
//! the orchestrator feeds it a freshly read task and acts on the result.

use thiserror::Error;

use crate::domain::{ServiceTask, StageKey, StageStep};

use super::catalog::ServiceCategory;

/// Why a step list or a requested transition cannot be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StageError {
    #[error("Malformed workflow: {reason}")]
    Malformed { reason: String },

    #[error("Backward transition rejected: at step {current}, requested step {requested}")]
    Backward { current: usize, requested: usize },

    #[error("Cannot skip stages: at step {current}, requested step {requested}")]
    Skip { current: usize, requested: usize },
}

impl StageError {
    fn malformed(reason: impl Into<String>) -> Self {
        StageError::Malformed {
            reason: reason.into(),
        }
    }
}

/// A single forward move
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub next_step_index: usize,
    pub next_status: StageKey,

    /// Key of the stage being entered (same as `next_status`)
    pub entering_stage_key: StageKey,

    /// The move leaves the first (intake) stage
    pub leaving_intake: bool,

    /// The move enters the last (pre-terminal) stage
    pub entering_pre_terminal: bool,
}

/// Result of asking for the next step
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NextStep {
    Advance(Transition),

    /// Already on the last step; delivery takes over from here
    Terminal,
}

/// How a caller-pinned target step relates to the task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetCheck {
    /// Target is the next step
    Proceed,

    /// Target already reached (retried request)
    AlreadyApplied,
}

/// Build the step list for a service category.
///
/// Categories with an outtake stage get four steps, the rest three.
pub fn steps_for(category: &ServiceCategory) -> Vec<StageStep> {
    let mut steps = vec![
        StageStep::new("Check-in", StageKey::Waiting),
        StageStep::new("In progress", StageKey::InProgress),
    ];
    if category.outtake_stage {
        steps.push(StageStep::new("Check-out", StageKey::Outtake));
    }
    steps.push(StageStep::new("Ready for pickup", StageKey::Ready));
    steps
}

/// Validate a step list on its own
pub fn validate_steps(steps: &[StageStep]) -> Result<(), StageError> {
    let (first, last) = match (steps.first(), steps.last()) {
        (Some(first), Some(last)) => (first, last),
        _ => return Err(StageError::malformed("step list is empty")),
    };

    if steps.len() < 3 {
        return Err(StageError::malformed(format!(
            "step list needs at least three steps, found {}",
            steps.len()
        )));
    }
    if first.key != StageKey::Waiting {
        return Err(StageError::malformed(format!(
            "first step must be waiting, found {}",
            first.key
        )));
    }
    if last.key != StageKey::Ready {
        return Err(StageError::malformed(format!(
            "last step must be ready, found {}",
            last.key
        )));
    }

    for (i, step) in steps.iter().enumerate() {
        if step.key == StageKey::Finished {
            return Err(StageError::malformed("finished cannot be a step"));
        }
        if steps[..i].iter().any(|s| s.key == step.key) {
            return Err(StageError::malformed(format!("stage {} appears twice", step.key)));
        }
    }

    Ok(())
}

/// Validate a task's step list, index and status together
pub fn check_task(task: &ServiceTask) -> Result<(), StageError> {
    validate_steps(&task.stage_steps)?;

    if task.current_step_index >= task.stage_steps.len() {
        return Err(StageError::malformed(format!(
            "step index {} out of range for {} steps",
            task.current_step_index,
            task.stage_steps.len()
        )));
    }
    if !task.is_consistent() {
        return Err(StageError::malformed(format!(
            "status {} does not match step {}",
            task.status, task.current_step_index
        )));
    }

    Ok(())
}

/// Compute the next step for a task
pub fn compute_next(task: &ServiceTask) -> Result<NextStep, StageError> {
    check_task(task)?;

    if task.is_last_step() {
        return Ok(NextStep::Terminal);
    }

    let next_step_index = task.current_step_index + 1;
    let next_status = task.stage_steps[next_step_index].key;

    Ok(NextStep::Advance(Transition {
        next_step_index,
        next_status,
        entering_stage_key: next_status,
        leaving_intake: task.current_step_index == 0,
        entering_pre_terminal: next_step_index + 1 == task.stage_steps.len(),
    }))
}

/// Compare a caller-pinned target step against the task
pub fn check_target(task: &ServiceTask, target: usize) -> Result<TargetCheck, StageError> {
    let current = task.current_step_index;
    if target == current + 1 {
        Ok(TargetCheck::Proceed)
    } else if target == current && current > 0 {
        Ok(TargetCheck::AlreadyApplied)
    } else if target <= current {
        Err(StageError::Backward {
            current,
            requested: target,
        })
    } else {
        Err(StageError::Skip {
            current,
            requested: target,
        })
    }
}
