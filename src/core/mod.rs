//! Core workflow logic.
//!
//! This module contains:
//! - Schema: checklist template validation, snapshots and value coercion
//! - AuditCodec: the tagged audit log format
//! - Stage: the pure stage controller
//! - Catalog: services, categories and named templates
//! - Orchestrator: transitions and their side effects

pub mod audit_codec;
pub mod catalog;
pub mod error;
pub mod orchestrator;
pub mod retry;
pub mod schema;
pub mod sla;
pub mod stage;

// Re-export commonly used types
pub use catalog::{CatalogStore, ServiceCatalog, ServiceCategory, ServiceDefinition};
pub use error::{SideEffectWarning, WorkflowError};
pub use orchestrator::{
    idempotency_key, AdvanceOutcome, AdvanceRequest, Collaborators, DeliveryQuote,
    DeliveryReceipt, Orchestrator, StagePayloadInput,
};
pub use retry::RetryPolicy;
pub use schema::SchemaViolation;
pub use sla::SlaReading;
pub use stage::{NextStep, StageError, TargetCheck, Transition};
