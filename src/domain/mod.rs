//! Domain types for the groomtrack engine.
//!
//! This module contains the core data structures:
//! - Task: service tasks, stage steps, appointments
//! - Template: checklist templates and collected values
//! - Audit: typed view of audit log entries
//! - Commerce: size tiers, products, payments

pub mod audit;
pub mod commerce;
pub mod task;
pub mod template;

// Re-export commonly used types
pub use audit::{AuditEntry, StageRecord, StageTag};
pub use commerce::{
    merge_used_products, products_cost, LedgerTransaction, PaymentMethod, Product,
    QuantityOverflow, SizeTier, UsedProduct, UsedProductDelta,
};
pub use task::{Appointment, ChecklistItem, ServiceTask, StageKey, StageStep};
pub use template::{
    ChecklistTemplate, Field, FieldType, FieldValue, Section, TemplateKind, TemplateSnapshot,
    ValueMap,
};
