//! Shared fixtures for integration tests.

#![allow(dead_code)]

use std::sync::Arc;

use chrono::Utc;
use rust_decimal::Decimal;

use groomtrack::adapters::{
    MemoryGallery, MemoryInventory, MemoryLedger, MemoryNotifier, MemoryTaskStore, TaskStore,
};
use groomtrack::core::{CatalogStore, Collaborators, Orchestrator, ServiceCatalog};
use groomtrack::domain::{Appointment, Product, SizeTier};

pub const CATALOG_YAML: &str = r#"
categories:
  - id: grooming
    name: Bath & grooming
    outtake_stage: true
  - id: clinic
    name: Clinic

services:
  - id: full-groom
    name: Full grooming
    category: grooming
    prices:
      small: 50
      medium: 65
    durations:
      small: 60
      medium: 90
    intake_template: groom-intake
    outtake_template: groom-outtake
    checklist:
      - id: nails
        text: Trim nails
      - id: ears
        text: Clean ears

  - id: consult
    name: Consultation
    category: clinic
    prices:
      small: 120

templates:
  - name: groom-intake
    sections:
      - title: Coat
        fields:
          - id: knots
            label: Knots found
            type: boolean
          - id: coat
            label: Coat condition
            type: choice
            choices: [good, matted]
          - id: before
            label: Before photo
            type: photo
            required: true
  - name: groom-outtake
    sections:
      - title: Finish
        fields:
          - id: perfume
            label: Perfume applied
            type: boolean
          - id: after
            label: After photo
            type: photo
"#;

/// Memory collaborators with handles kept for assertions
pub struct Harness {
    pub tasks: Arc<MemoryTaskStore>,
    pub catalog: Arc<CatalogStore>,
    pub inventory: Arc<MemoryInventory>,
    pub gallery: Arc<MemoryGallery>,
    pub ledger: Arc<MemoryLedger>,
    pub notifier: Arc<MemoryNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        let catalog = ServiceCatalog::from_yaml(CATALOG_YAML).unwrap();
        catalog.validate().unwrap();

        Self {
            tasks: Arc::new(MemoryTaskStore::new()),
            catalog: Arc::new(CatalogStore::new(catalog)),
            inventory: Arc::new(MemoryInventory::new([shampoo(10)])),
            gallery: Arc::new(MemoryGallery::new()),
            ledger: Arc::new(MemoryLedger::new()),
            notifier: Arc::new(MemoryNotifier::new()),
        }
    }

    pub fn collaborators(&self) -> Collaborators {
        self.collaborators_with_tasks(self.tasks.clone())
    }

    /// Same collaborators, with the task store swapped out
    pub fn collaborators_with_tasks(&self, tasks: Arc<dyn TaskStore>) -> Collaborators {
        Collaborators {
            tasks,
            templates: self.catalog.clone(),
            inventory: self.inventory.clone(),
            gallery: self.gallery.clone(),
            ledger: self.ledger.clone(),
            notifier: self.notifier.clone(),
        }
    }

    pub fn orchestrator(&self) -> Orchestrator {
        Orchestrator::new(self.collaborators())
    }
}

pub fn shampoo(stock: u32) -> Product {
    Product {
        id: "shampoo".to_string(),
        name: "Shampoo".to_string(),
        unit_price: Decimal::from(10),
        stock,
    }
}

pub fn appointment(service_id: &str, size_tier: SizeTier) -> Appointment {
    Appointment {
        id: "appt-1".to_string(),
        pet_id: "rex".to_string(),
        owner_id: "ana".to_string(),
        service_id: service_id.to_string(),
        size_tier,
        scheduled_at: Utc::now(),
    }
}
