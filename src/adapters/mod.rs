//! Adapter interfaces for external collaborators.
//!
//! The orchestrator only talks to these traits. Backends:
//! - `memory`: in-process stores (tests, demos)
//! - `sqlite`: durable single-file backend used by the CLI
//! - `outbox`: JSONL delivery notifier

pub mod memory;
pub mod outbox;
pub mod sqlite;

use std::collections::BTreeMap;
use std::fmt;

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::core::catalog::{ServiceCategory, ServiceDefinition};
use crate::domain::{
    ChecklistTemplate, PaymentMethod, Product, ServiceTask, StageKey, TemplateKind, UsedProduct,
};

pub use memory::{MemoryGallery, MemoryInventory, MemoryLedger, MemoryNotifier, MemoryTaskStore};
pub use outbox::OutboxNotifier;
pub use sqlite::SqliteStore;

/// Errors returned by collaborator backends
#[derive(Debug, Error)]
pub enum StoreError {
    /// The task changed since the caller read it
    #[error("stale version for task {task_id}: expected {expected}")]
    StaleVersion { task_id: Uuid, expected: Version },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("insufficient stock for {product_id}: {available} available, {requested} requested")]
    InsufficientStock {
        product_id: String,
        available: u32,
        requested: u32,
    },

    /// A backend-specific failure (I/O, database, serialization)
    #[error("backend error: {0}")]
    Backend(String),
}

impl From<rusqlite::Error> for StoreError {
    fn from(e: rusqlite::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        StoreError::Backend(e.to_string())
    }
}

/// Opaque token identifying one stored revision of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Version(pub u64);

impl Version {
    pub fn initial() -> Self {
        Version(0)
    }

    pub fn next(self) -> Self {
        Version(self.0 + 1)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// A task together with the version it was read at
#[derive(Debug, Clone)]
pub struct VersionedTask {
    pub task: ServiceTask,
    pub version: Version,
}

/// One combined update to a stored task.
///
/// Audit entries are appended, never replaced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskDelta {
    pub append_log: Vec<String>,
    pub current_step_index: Option<usize>,
    pub status: Option<StageKey>,
    pub used_products: Option<BTreeMap<String, UsedProduct>>,
    pub finished_at: Option<chrono::DateTime<chrono::Utc>>,
}

impl TaskDelta {
    pub fn is_empty(&self) -> bool {
        self.append_log.is_empty()
            && self.current_step_index.is_none()
            && self.status.is_none()
            && self.used_products.is_none()
            && self.finished_at.is_none()
    }

    /// Apply to an in-memory task (used by every backend)
    pub fn apply(&self, task: &mut ServiceTask) {
        task.audit_log.extend(self.append_log.iter().cloned());
        if let Some(index) = self.current_step_index {
            task.current_step_index = index;
        }
        if let Some(status) = self.status {
            task.status = status;
        }
        if let Some(ref used) = self.used_products {
            task.used_products = used.clone();
        }
        if let Some(at) = self.finished_at {
            task.finished_at = Some(at);
        }
    }
}

/// Payload handed to the print/notify collaborator after delivery
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeliveryNotice {
    pub task_id: Uuid,
    pub pet_id: String,
    pub owner_id: String,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub transaction_id: Uuid,
}

/// Task persistence with compare-and-swap writes
#[async_trait]
pub trait TaskStore: Send + Sync {
    /// Store a new task at the initial version
    async fn insert(&self, task: &ServiceTask) -> Result<Version, StoreError>;

    /// Read the current task and its version
    async fn read(&self, task_id: Uuid) -> Result<VersionedTask, StoreError>;

    /// Apply `delta` only if the stored version still equals `expected`.
    ///
    /// Returns the new version, or `StoreError::StaleVersion`.
    async fn write(
        &self,
        task_id: Uuid,
        expected: Version,
        delta: &TaskDelta,
    ) -> Result<Version, StoreError>;
}

/// Services, categories and named templates (read at task creation only)
#[async_trait]
pub trait TemplateStore: Send + Sync {
    async fn service(&self, service_id: &str) -> Result<ServiceDefinition, StoreError>;

    async fn category(&self, category_id: &str) -> Result<ServiceCategory, StoreError>;

    async fn template_for(
        &self,
        service_id: &str,
        kind: TemplateKind,
    ) -> Result<Option<ChecklistTemplate>, StoreError>;
}

/// Stock counters
#[async_trait]
pub trait InventoryStore: Send + Sync {
    async fn decrement_stock(&self, product_id: &str, quantity: u32) -> Result<(), StoreError>;

    async fn list_available(&self, tenant_id: &str) -> Result<Vec<Product>, StoreError>;
}

/// Per-pet photo gallery
#[async_trait]
pub trait GalleryStore: Send + Sync {
    /// Append references not already present; returns how many were added
    async fn append_photos(&self, pet_id: &str, urls: &[String]) -> Result<usize, StoreError>;
}

/// Financial ledger
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn record_income(
        &self,
        owner_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Uuid, StoreError>;
}

/// Print/notify collaborator signalled after delivery
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Human-readable notifier name
    fn name(&self) -> &str;

    async fn notify_delivery(&self, notice: &DeliveryNotice) -> Result<(), StoreError>;
}
