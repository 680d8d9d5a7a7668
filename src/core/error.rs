//! Errors and warnings surfaced by the orchestrator.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::adapters::{StoreError, Version};
use crate::domain::{SizeTier, StageKey};

use super::schema::SchemaViolation;
use super::stage::StageError;

/// Failures of a workflow operation
#[derive(Debug, Error)]
pub enum WorkflowError {
    /// Task has no usable step list; it cannot advance
    #[error("Malformed workflow for task {task_id}: {reason}")]
    MalformedWorkflow { task_id: Uuid, reason: String },

    /// Concurrent write conflict; re-read and retry
    #[error("Task {task_id} changed since it was read at {expected}; re-read and retry")]
    StaleVersion { task_id: Uuid, expected: Version },

    /// Primary task-store operation failed; nothing after it was attempted
    #[error("Task store failure for task {task_id}: {source}")]
    Persistence {
        task_id: Uuid,
        #[source]
        source: StoreError,
    },

    /// Task marked finished but the ledger entry was not written
    #[error(
        "Task {task_id} is finished but no ledger entry was recorded for {amount}; \
         manual reconciliation required: {source}"
    )]
    InconsistentFinalization {
        task_id: Uuid,
        amount: Decimal,
        #[source]
        source: StoreError,
    },

    #[error("Task not found: {0}")]
    TaskNotFound(Uuid),

    #[error("Task {task_id}: backward transition from step {current} to {requested} rejected")]
    BackwardTransition {
        task_id: Uuid,
        current: usize,
        requested: usize,
    },

    #[error("Task {task_id}: cannot skip from step {current} to {requested}")]
    SkippedStage {
        task_id: Uuid,
        current: usize,
        requested: usize,
    },

    #[error("Task {task_id} is {status}, not ready for delivery")]
    NotReadyForDelivery { task_id: Uuid, status: StageKey },

    #[error("Task {0} is already finished")]
    AlreadyFinished(Uuid),

    #[error("Invalid delivery amount: {0}")]
    InvalidAmount(Decimal),

    /// Merged product quantity does not fit; nothing was written
    #[error("Task {task_id}: quantity of product {product_id} overflows")]
    InvalidQuantity { task_id: Uuid, product_id: String },

    /// Input sent to a task on its ready step, where an advance writes nothing
    #[error("Task {task_id} is {status}; nothing further can be recorded before delivery")]
    NothingToApply { task_id: Uuid, status: StageKey },

    #[error("Unknown service: {0}")]
    UnknownService(String),

    #[error("Unknown service category: {0}")]
    UnknownCategory(String),

    #[error("Service {service_id} has no price for size tier {tier}")]
    UnpricedSizeTier { service_id: String, tier: SizeTier },

    #[error("Invalid checklist data: {0}")]
    Schema(#[from] SchemaViolation),

    /// Stage payload could not be serialized into its log entry
    #[error("Failed to encode audit entry: {0}")]
    AuditEncoding(#[from] serde_json::Error),

    /// Secondary collaborator failure outside a transition (catalog reads)
    #[error("Collaborator failure: {0}")]
    Collaborator(#[source] StoreError),
}

impl WorkflowError {
    pub(crate) fn from_stage(task_id: Uuid, err: StageError) -> Self {
        match err {
            StageError::Malformed { reason } => WorkflowError::MalformedWorkflow { task_id, reason },
            StageError::Backward { current, requested } => WorkflowError::BackwardTransition {
                task_id,
                current,
                requested,
            },
            StageError::Skip { current, requested } => WorkflowError::SkippedStage {
                task_id,
                current,
                requested,
            },
        }
    }

    /// Map a task-store error from a read or the primary write
    pub(crate) fn from_task_store(task_id: Uuid, err: StoreError) -> Self {
        match err {
            StoreError::StaleVersion { expected, .. } => {
                WorkflowError::StaleVersion { task_id, expected }
            }
            StoreError::NotFound(_) => WorkflowError::TaskNotFound(task_id),
            other => WorkflowError::Persistence {
                task_id,
                source: other,
            },
        }
    }

    /// Whether re-reading and retrying can succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, WorkflowError::StaleVersion { .. })
    }
}

/// A secondary write failed after the primary update committed.
///
/// The operation still succeeded; these are reported, never rolled back.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SideEffectWarning {
    #[error("Gallery append for pet {pet_id} failed: {error}")]
    Gallery { pet_id: String, error: String },

    #[error("Stock decrement for product {product_id} (qty {quantity}) failed: {error}")]
    Inventory {
        product_id: String,
        quantity: u32,
        error: String,
    },

    #[error("Delivery notification via {notifier} failed: {error}")]
    Notify { notifier: String, error: String },

    #[error("Skipped duplicate {entry} entry; the log already holds one")]
    DuplicateEntry { entry: String },

    #[error("Stage payload ignored; entering {entering} crosses no intake or outtake boundary")]
    IgnoredPayload { entering: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_store_error_mapping() {
        let id = Uuid::new_v4();

        let stale = WorkflowError::from_task_store(
            id,
            StoreError::StaleVersion {
                task_id: id,
                expected: Version(3),
            },
        );
        assert!(stale.is_retryable());
        assert!(matches!(stale, WorkflowError::StaleVersion { expected: Version(3), .. }));

        let missing = WorkflowError::from_task_store(id, StoreError::NotFound("x".into()));
        assert!(matches!(missing, WorkflowError::TaskNotFound(_)));

        let backend = WorkflowError::from_task_store(id, StoreError::Backend("disk".into()));
        assert!(matches!(backend, WorkflowError::Persistence { .. }));
        assert!(!backend.is_retryable());
    }

    #[test]
    fn test_messages_are_distinguishable() {
        let id = Uuid::new_v4();
        let inconsistent = WorkflowError::InconsistentFinalization {
            task_id: id,
            amount: Decimal::from(70),
            source: StoreError::Backend("ledger down".into()),
        };
        let message = inconsistent.to_string();
        assert!(message.contains("manual reconciliation"));
        assert!(message.contains("70"));
    }

    #[test]
    fn test_encoding_failure_surfaces() {
        let json_err = serde_json::from_str::<u32>("not json").unwrap_err();
        let err: WorkflowError = json_err.into();

        assert!(matches!(err, WorkflowError::AuditEncoding(_)));
        assert!(!err.is_retryable());
        assert!(err.to_string().starts_with("Failed to encode audit entry"));
    }
}
