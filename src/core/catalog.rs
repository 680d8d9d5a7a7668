//! Service catalog: categories, services and named checklist templates.
//!
//! Catalogs are defined in YAML. Templates here are the mutable, named
//! versions; tasks copy them by value at creation time and never look them
//! up again.

use std::collections::{BTreeMap, HashSet};
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::info;

use crate::adapters::{StoreError, TemplateStore};
use crate::domain::{ChecklistItem, ChecklistTemplate, SizeTier, TemplateKind};

use super::schema::validate_template;

/// Minutes assumed when a service has no duration for a size tier
const DEFAULT_DURATION_MINUTES: u32 = 60;

/// A group of services sharing one stage layout
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCategory {
    pub id: String,
    pub name: String,

    /// Adds a check-out stage between execution and pickup
    #[serde(default)]
    pub outtake_stage: bool,
}

/// A bookable service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDefinition {
    pub id: String,
    pub name: String,

    /// Category id
    pub category: String,

    /// Base price per size tier
    #[serde(default)]
    pub prices: BTreeMap<SizeTier, Decimal>,

    /// Expected minutes per size tier
    #[serde(default)]
    pub durations: BTreeMap<SizeTier, u32>,

    /// Template names
    pub intake_template: Option<String>,
    pub outtake_template: Option<String>,

    /// Simple execution steps
    #[serde(default)]
    pub checklist: Vec<ChecklistItem>,
}

impl ServiceDefinition {
    pub fn price_for(&self, tier: SizeTier) -> Option<Decimal> {
        self.prices.get(&tier).copied()
    }

    pub fn duration_for(&self, tier: SizeTier) -> u32 {
        self.durations
            .get(&tier)
            .copied()
            .unwrap_or(DEFAULT_DURATION_MINUTES)
    }

    pub fn template_name(&self, kind: TemplateKind) -> Option<&str> {
        match kind {
            TemplateKind::Intake => self.intake_template.as_deref(),
            TemplateKind::Outtake => self.outtake_template.as_deref(),
        }
    }
}

/// A complete catalog definition
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceCatalog {
    #[serde(default)]
    pub categories: Vec<ServiceCategory>,

    #[serde(default)]
    pub services: Vec<ServiceDefinition>,

    #[serde(default)]
    pub templates: Vec<ChecklistTemplate>,
}

impl ServiceCatalog {
    /// Load a catalog from a YAML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file: {}", path.display()))?;

        Self::from_yaml(&content)
    }

    /// Parse a catalog from YAML content
    pub fn from_yaml(content: &str) -> Result<Self> {
        serde_yaml::from_str(content).context("Failed to parse catalog YAML")
    }

    /// Validate cross references and template structure
    pub fn validate(&self) -> Result<()> {
        let mut category_ids = HashSet::new();
        for category in &self.categories {
            if !category_ids.insert(category.id.as_str()) {
                anyhow::bail!("Category '{}' is defined more than once", category.id);
            }
        }

        let mut template_names = HashSet::new();
        for template in &self.templates {
            validate_template(template)?;
            if !template_names.insert(template.name.as_str()) {
                anyhow::bail!("Template '{}' is defined more than once", template.name);
            }
        }

        let mut service_ids = HashSet::new();
        for service in &self.services {
            if !service_ids.insert(service.id.as_str()) {
                anyhow::bail!("Service '{}' is defined more than once", service.id);
            }
            if !category_ids.contains(service.category.as_str()) {
                anyhow::bail!(
                    "Service '{}' references non-existent category '{}'",
                    service.id,
                    service.category
                );
            }
            for kind in [TemplateKind::Intake, TemplateKind::Outtake] {
                if let Some(name) = service.template_name(kind) {
                    if !template_names.contains(name) {
                        anyhow::bail!(
                            "Service '{}' references non-existent {} template '{}'",
                            service.id,
                            kind,
                            name
                        );
                    }
                }
            }
        }

        Ok(())
    }

    pub fn category(&self, id: &str) -> Option<&ServiceCategory> {
        self.categories.iter().find(|c| c.id == id)
    }

    pub fn service(&self, id: &str) -> Option<&ServiceDefinition> {
        self.services.iter().find(|s| s.id == id)
    }

    pub fn template(&self, name: &str) -> Option<&ChecklistTemplate> {
        self.templates.iter().find(|t| t.name == name)
    }

    /// Insert or replace a template by name
    pub fn upsert_template(&mut self, template: ChecklistTemplate) -> Result<()> {
        validate_template(&template)?;

        if let Some(existing) = self.templates.iter_mut().find(|t| t.name == template.name) {
            *existing = template;
        } else {
            self.templates.push(template);
        }

        Ok(())
    }
}

/// Shared, editable catalog serving as the template store
#[derive(Debug, Default)]
pub struct CatalogStore {
    catalog: RwLock<ServiceCatalog>,
}

impl CatalogStore {
    pub fn new(catalog: ServiceCatalog) -> Self {
        Self {
            catalog: RwLock::new(catalog),
        }
    }

    /// Load and validate a catalog file
    pub fn open(path: &Path) -> Result<Self> {
        let catalog = ServiceCatalog::from_file(path)?;
        catalog
            .validate()
            .with_context(|| format!("Invalid catalog: {}", path.display()))?;

        info!(
            path = %path.display(),
            services = catalog.services.len(),
            templates = catalog.templates.len(),
            "Loaded service catalog"
        );
        Ok(Self::new(catalog))
    }

    /// Edit a named template; tasks created earlier keep their own copy
    pub async fn upsert_template(&self, template: ChecklistTemplate) -> Result<()> {
        self.catalog.write().await.upsert_template(template)
    }

    /// Copy of the current catalog
    pub async fn snapshot(&self) -> ServiceCatalog {
        self.catalog.read().await.clone()
    }
}

#[async_trait]
impl TemplateStore for CatalogStore {
    async fn service(&self, service_id: &str) -> Result<ServiceDefinition, StoreError> {
        self.catalog
            .read()
            .await
            .service(service_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("service {}", service_id)))
    }

    async fn category(&self, category_id: &str) -> Result<ServiceCategory, StoreError> {
        self.catalog
            .read()
            .await
            .category(category_id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("category {}", category_id)))
    }

    async fn template_for(
        &self,
        service_id: &str,
        kind: TemplateKind,
    ) -> Result<Option<ChecklistTemplate>, StoreError> {
        let catalog = self.catalog.read().await;
        let service = catalog
            .service(service_id)
            .ok_or_else(|| StoreError::NotFound(format!("service {}", service_id)))?;

        match service.template_name(kind) {
            None => Ok(None),
            Some(name) => catalog
                .template(name)
                .cloned()
                .map(Some)
                .ok_or_else(|| StoreError::NotFound(format!("template {}", name))),
        }
    }
}
