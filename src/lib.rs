//! groomtrack - Stage-driven execution engine for pet service appointments
//!
//! Each appointment becomes a `ServiceTask` that walks a fixed list of
//! stages (waiting, in progress, optional check-out, ready) and is finally
//! delivered. Every forward move is a single conditional write; secondary
//! effects (stock, gallery, notifications) follow it and never undo it.
//!
//! # Modules
//!
//! - `adapters`: Collaborator traits and backends (memory, SQLite, outbox)
//! - `core`: Schema engine, audit codec, stage controller, orchestrator
//! - `domain`: Data structures (ServiceTask, templates, products)
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Open a task for an appointment
//! groomtrack create --appointment a-17 --pet rex --owner ana --service bath --size m
//!
//! # Move it forward
//! groomtrack advance <task-id> --check nails --payload intake.yaml
//!
//! # Deliver it
//! groomtrack delivery <task-id>
//! groomtrack confirm <task-id> --amount 70 --method pix
//! ```

pub mod adapters;
pub mod cli;
pub mod config;
pub mod core;
pub mod domain;

// Re-export main types at crate root for convenience
pub use core::{AdvanceRequest, Collaborators, Orchestrator, WorkflowError};
pub use domain::{Appointment, ServiceTask, StageKey};
