//! Command-line interface for groomtrack.
//!
//! Provides commands for opening tasks from appointments, advancing them
//! through their stages, delivering them, and inspecting the catalog and
//! product stock.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::adapters::{InventoryStore, OutboxNotifier, SqliteStore};
use crate::config::{self, ResolvedConfig};
use crate::core::{
    audit_codec, sla, AdvanceOutcome, AdvanceRequest, CatalogStore, Collaborators,
    DeliveryQuote, Orchestrator, StagePayloadInput,
};
use crate::domain::{
    Appointment, PaymentMethod, ServiceTask, SizeTier, StageRecord, StageTag, UsedProductDelta,
};

pub mod products;

/// groomtrack - Stage-driven execution engine for pet service appointments
#[derive(Parser, Debug)]
#[command(name = "groomtrack")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Open a task for an appointment
    Create {
        /// Appointment ID
        #[arg(long)]
        appointment: String,

        /// Pet ID
        #[arg(long)]
        pet: String,

        /// Owner (client) ID
        #[arg(long)]
        owner: String,

        /// Service ID from the catalog
        #[arg(long)]
        service: String,

        /// Size tier (small/medium/large/giant or p/m/g/gg)
        #[arg(long, value_parser = parse_size_tier)]
        size: SizeTier,

        /// Scheduled time (RFC 3339, defaults to now)
        #[arg(long)]
        at: Option<DateTime<Utc>>,
    },

    /// Move a task one stage forward
    Advance {
        /// Task ID (UUID)
        task_id: String,

        /// Checklist item ids to mark done (repeatable)
        #[arg(long = "check")]
        checks: Vec<String>,

        /// Intake/outtake payload file (YAML or JSON)
        #[arg(long)]
        payload: Option<PathBuf>,

        /// Product used, as <product-id>:<quantity> (repeatable)
        #[arg(long = "product", value_parser = parse_product_arg)]
        products: Vec<(String, u32)>,

        /// Step the task should reach; makes re-runs idempotent
        #[arg(long)]
        target: Option<usize>,
    },

    /// Show a task
    Show {
        /// Task ID (UUID)
        task_id: String,
    },

    /// List recent tasks
    List {
        /// Maximum number of tasks to show
        #[arg(short, long, default_value = "10")]
        limit: usize,
    },

    /// Show the suggested delivery amount for a ready task
    Delivery {
        /// Task ID (UUID)
        task_id: String,
    },

    /// Confirm delivery and record payment
    Confirm {
        /// Task ID (UUID)
        task_id: String,

        /// Amount charged (defaults to the suggested amount)
        #[arg(long)]
        amount: Option<Decimal>,

        /// Payment method (cash, credit, debit, pix, transfer)
        #[arg(long, value_parser = parse_payment_method)]
        method: PaymentMethod,
    },

    /// List catalog services and categories
    Services,

    /// Manage product stock
    Products {
        #[command(subcommand)]
        command: products::ProductCommands,
    },

    /// Show resolved configuration (debug)
    Config,
}

fn parse_size_tier(raw: &str) -> Result<SizeTier, String> {
    raw.parse()
}

fn parse_payment_method(raw: &str) -> Result<PaymentMethod, String> {
    raw.parse()
}

/// Parse `<product-id>:<quantity>`
fn parse_product_arg(raw: &str) -> Result<(String, u32), String> {
    let (id, qty) = raw
        .rsplit_once(':')
        .ok_or_else(|| format!("expected <product-id>:<quantity>, got '{}'", raw))?;
    if id.trim().is_empty() {
        return Err(format!("missing product id in '{}'", raw));
    }
    let qty = qty
        .trim()
        .parse::<u32>()
        .map_err(|e| format!("bad quantity in '{}': {}", raw, e))?;
    Ok((id.trim().to_string(), qty))
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(self) -> Result<()> {
        let cfg = config::config()?;

        match self.command {
            Commands::Create {
                appointment,
                pet,
                owner,
                service,
                size,
                at,
            } => {
                let appointment = Appointment {
                    id: appointment,
                    pet_id: pet,
                    owner_id: owner,
                    service_id: service,
                    size_tier: size,
                    scheduled_at: at.unwrap_or_else(Utc::now),
                };
                create_task(cfg, &appointment).await
            }
            Commands::Advance {
                task_id,
                checks,
                payload,
                products,
                target,
            } => advance_task(cfg, &task_id, checks, payload, products, target).await,
            Commands::Show { task_id } => show_task(cfg, &task_id).await,
            Commands::List { limit } => list_tasks(cfg, limit).await,
            Commands::Delivery { task_id } => open_delivery(cfg, &task_id).await,
            Commands::Confirm {
                task_id,
                amount,
                method,
            } => confirm_delivery(cfg, &task_id, amount, method).await,
            Commands::Services => list_services(cfg).await,
            Commands::Products { command } => products::execute(cfg, command).await,
            Commands::Config => show_config(cfg),
        }
    }
}

/// Backends the CLI works against
struct Runtime {
    store: Arc<SqliteStore>,
    orchestrator: Orchestrator,
}

impl Runtime {
    fn open(cfg: &ResolvedConfig) -> Result<Self> {
        let store = Arc::new(open_store(cfg)?);
        let catalog = Arc::new(CatalogStore::open(&cfg.catalog)?);
        let notifier = Arc::new(OutboxNotifier::new(cfg.outbox.clone()));

        let orchestrator = Orchestrator::new(Collaborators {
            tasks: store.clone(),
            templates: catalog,
            inventory: store.clone(),
            gallery: store.clone(),
            ledger: store.clone(),
            notifier,
        });

        Ok(Self {
            store,
            orchestrator,
        })
    }
}

pub(crate) fn open_store(cfg: &ResolvedConfig) -> Result<SqliteStore> {
    SqliteStore::open(&cfg.database)
        .with_context(|| format!("Failed to open database: {}", cfg.database.display()))
}

fn parse_task_id(raw: &str) -> Result<Uuid> {
    Uuid::parse_str(raw).with_context(|| format!("Invalid task ID: {}", raw))
}

fn load_payload(path: &Path) -> Result<StagePayloadInput> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read payload file: {}", path.display()))?;

    // YAML is a superset of JSON, one parser covers both
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse payload file: {}", path.display()))
}

/// Open a task for an appointment
async fn create_task(cfg: &ResolvedConfig, appointment: &Appointment) -> Result<()> {
    let rt = Runtime::open(cfg)?;
    let task = rt.orchestrator.create_task(appointment).await?;

    println!("Task ID: {}", task.id);
    println!("Service: {} ({})", task.service_id, task.size_tier);
    println!("Base price: {}", task.base_price);
    println!("Stages:");
    print_steps(&task);

    Ok(())
}

/// Advance a task and report what happened
async fn advance_task(
    cfg: &ResolvedConfig,
    task_id: &str,
    checks: Vec<String>,
    payload: Option<PathBuf>,
    products: Vec<(String, u32)>,
    target: Option<usize>,
) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let rt = Runtime::open(cfg)?;

    let stage_payload = payload.as_deref().map(load_payload).transpose()?;

    let used_products = if products.is_empty() {
        Vec::new()
    } else {
        let listed = rt.store.list_available(&cfg.tenant_id).await?;
        products
            .into_iter()
            .map(|(id, qty)| {
                listed
                    .iter()
                    .find(|p| p.id == id)
                    .map(|p| UsedProductDelta::from_product(p, qty))
                    .with_context(|| format!("Product '{}' is not available", id))
            })
            .collect::<Result<Vec<_>>>()?
    };

    let request = AdvanceRequest {
        checked_item_ids: checks,
        stage_payload,
        used_products,
        target_step: target,
    };

    let outcome = rt
        .orchestrator
        .advance_with_retry(task_id, request, &cfg.retry)
        .await?;
    print_outcome(&outcome);

    Ok(())
}

fn print_outcome(outcome: &AdvanceOutcome) {
    let task = &outcome.task;

    match (&outcome.transition, outcome.replayed) {
        (Some(t), _) => println!(
            "Advanced to step {} ({})",
            t.next_step_index, t.next_status
        ),
        (None, true) => println!(
            "Already at step {} ({}), nothing to do",
            task.current_step_index, task.status
        ),
        (None, false) => println!("Task is on its last stage; use 'delivery' and 'confirm'"),
    }

    for warning in &outcome.warnings {
        eprintln!("warning: {}", warning);
    }

    if let Some(quote) = &outcome.delivery {
        print_quote(quote);
    }
}

fn print_quote(quote: &DeliveryQuote) {
    println!();
    println!("Base price:     {}", quote.base_price);
    println!("Products:       {}", quote.products_cost);
    println!("Suggested total: {}", quote.computed_amount);
}

fn print_steps(task: &ServiceTask) {
    for (i, step) in task.stage_steps.iter().enumerate() {
        let marker = if i == task.current_step_index { ">" } else { " " };
        println!("  {} {}. {} [{}]", marker, i, step.label, step.key);
    }
}

fn print_record(tag: StageTag, record: &StageRecord) {
    println!();
    println!("{}:", tag);
    if let Some(name) = &record.template_name {
        println!("  Template: {}", name);
    }
    if !record.belongings.is_empty() {
        println!("  Belongings: {}", record.belongings);
    }
    if !record.analysis.is_empty() {
        println!("  Analysis: {}", record.analysis);
    }
    if !record.grooming_notes.is_empty() {
        println!("  Notes: {}", record.grooming_notes);
    }
    for (field, value) in &record.dynamic_values {
        println!("  {}: {:?}", field, value);
    }
    for url in &record.photos {
        println!("  Photo: {}", url);
    }
}

/// Show a task
async fn show_task(cfg: &ResolvedConfig, task_id: &str) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let rt = Runtime::open(cfg)?;
    let task = rt.orchestrator.get_task(task_id).await?;

    println!("Task ID: {}", task.id);
    println!("Appointment: {}", task.appointment_id);
    println!("Pet: {}  Owner: {}", task.pet_id, task.owner_id);
    println!("Service: {} ({})", task.service_id, task.size_tier);
    println!("Status: {}", task.status);
    println!("Created: {}", task.created_at);
    if let Some(finished) = task.finished_at {
        println!("Finished: {}", finished);
    }

    println!("\nStages:");
    print_steps(&task);

    if let Some(reading) = sla::reading(&task, Utc::now()) {
        println!(
            "\nClock: started {}, {} of {} min{}",
            reading.started_at,
            reading.elapsed_minutes,
            reading.expected_minutes,
            if reading.overdue { " (overdue)" } else { "" }
        );
    }

    let checked = audit_codec::checked_items(&task.audit_log);
    if !task.checklist_items.is_empty() {
        println!("\nChecklist:");
        for item in &task.checklist_items {
            let mark = if checked.contains(&item.id.as_str()) { "x" } else { " " };
            println!("  [{}] {} ({})", mark, item.text, item.id);
        }
    }

    for tag in [StageTag::CheckIn, StageTag::CheckOut] {
        if let Some(record) = audit_codec::decode(&task.audit_log, tag) {
            print_record(tag, &record);
        }
    }

    if !task.used_products.is_empty() {
        println!("\nProducts used:");
        for (id, used) in &task.used_products {
            println!(
                "  {} ({}) x{} = {}",
                used.name,
                id,
                used.quantity,
                used.line_total()
            );
        }
    }

    Ok(())
}

/// List recent tasks
async fn list_tasks(cfg: &ResolvedConfig, limit: usize) -> Result<()> {
    let store = open_store(cfg)?;
    let tasks = store.list_tasks(limit)?;

    if tasks.is_empty() {
        println!("No tasks found");
        return Ok(());
    }

    println!("{:<38} {:<12} {:<16} {:<14}", "TASK ID", "PET", "SERVICE", "STATUS");
    println!("{}", "-".repeat(82));

    for task in tasks {
        println!(
            "{:<38} {:<12} {:<16} {:<14}",
            task.id,
            task.pet_id,
            task.service_id,
            task.status.to_string()
        );
    }

    Ok(())
}

/// Show the suggested delivery amount
async fn open_delivery(cfg: &ResolvedConfig, task_id: &str) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let rt = Runtime::open(cfg)?;
    let quote = rt.orchestrator.open_delivery(task_id).await?;

    println!("Task ID: {}", quote.task_id);
    print_quote(&quote);

    Ok(())
}

/// Confirm delivery and record the payment
async fn confirm_delivery(
    cfg: &ResolvedConfig,
    task_id: &str,
    amount: Option<Decimal>,
    method: PaymentMethod,
) -> Result<()> {
    let task_id = parse_task_id(task_id)?;
    let rt = Runtime::open(cfg)?;

    let amount = match amount {
        Some(amount) => amount,
        None => rt.orchestrator.open_delivery(task_id).await?.computed_amount,
    };

    let receipt = rt
        .orchestrator
        .confirm_delivery(task_id, amount, method)
        .await?;

    println!("Task {} delivered", receipt.task.id);
    println!("Amount: {} ({})", receipt.amount, receipt.payment_method);
    println!("Transaction: {}", receipt.transaction_id);
    for warning in &receipt.warnings {
        eprintln!("warning: {}", warning);
    }

    Ok(())
}

/// List catalog services
async fn list_services(cfg: &ResolvedConfig) -> Result<()> {
    let catalog = CatalogStore::open(&cfg.catalog)?.snapshot().await;

    if catalog.services.is_empty() {
        println!("Catalog has no services: {}", cfg.catalog.display());
        return Ok(());
    }

    println!("{:<16} {:<28} {:<16} {:<8}", "ID", "NAME", "CATEGORY", "STAGES");
    println!("{}", "-".repeat(72));

    for service in &catalog.services {
        let stages = catalog
            .category(&service.category)
            .map(|c| if c.outtake_stage { "4" } else { "3" })
            .unwrap_or("?");
        println!(
            "{:<16} {:<28} {:<16} {:<8}",
            service.id, service.name, service.category, stages
        );
        for (tier, price) in &service.prices {
            println!(
                "    {:<8} {:>10}  {} min",
                tier.to_string(),
                price.to_string(),
                service.duration_for(*tier)
            );
        }
    }

    println!("\nTemplates: {}", catalog.templates.len());

    Ok(())
}

/// Show resolved configuration
fn show_config(cfg: &ResolvedConfig) -> Result<()> {
    println!("groomtrack configuration");
    println!();
    println!(
        "Config file: {}",
        cfg.config_file
            .as_ref()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "(none - using defaults)".to_string())
    );
    println!();
    println!("Paths:");
    println!("  Home:     {}", cfg.home.display());
    println!("  Database: {}", cfg.database.display());
    println!("  Catalog:  {}", cfg.catalog.display());
    println!("  Outbox:   {}", cfg.outbox.display());
    println!();
    println!("Tenant: {}", cfg.tenant_id);
    println!();
    println!("Retry policy:");
    println!("  Max attempts:  {}", cfg.retry.max_attempts);
    println!("  Initial delay: {}ms", cfg.retry.initial_delay_ms);
    println!("  Max delay:     {}ms", cfg.retry.max_delay_ms);
    println!("  Backoff:       x{}", cfg.retry.backoff_multiplier);

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_product_arg() {
        assert_eq!(
            parse_product_arg("shampoo:2").unwrap(),
            ("shampoo".to_string(), 2)
        );
        assert_eq!(
            parse_product_arg("ns:sku-1:3").unwrap(),
            ("ns:sku-1".to_string(), 3)
        );
        assert!(parse_product_arg("shampoo").is_err());
        assert!(parse_product_arg(":2").is_err());
        assert!(parse_product_arg("shampoo:many").is_err());
    }

    #[test]
    fn test_cli_parses_advance() {
        let cli = Cli::try_parse_from([
            "groomtrack",
            "advance",
            "550e8400-e29b-41d4-a716-446655440000",
            "--check",
            "nails",
            "--product",
            "shampoo:2",
            "--target",
            "1",
        ])
        .unwrap();

        match cli.command {
            Commands::Advance {
                checks,
                products,
                target,
                ..
            } => {
                assert_eq!(checks, vec!["nails"]);
                assert_eq!(products, vec![("shampoo".to_string(), 2)]);
                assert_eq!(target, Some(1));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_cli_parses_confirm() {
        let cli = Cli::try_parse_from([
            "groomtrack",
            "confirm",
            "550e8400-e29b-41d4-a716-446655440000",
            "--amount",
            "70.00",
            "--method",
            "pix",
        ])
        .unwrap();

        match cli.command {
            Commands::Confirm { amount, method, .. } => {
                assert_eq!(amount, Some(Decimal::new(7000, 2)));
                assert_eq!(method, PaymentMethod::Pix);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_load_payload_yaml() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("intake.yaml");
        std::fs::write(
            &path,
            "belongings: red collar\nvalues:\n  knots: true\n  coat: short\nphotos:\n  - https://cdn/1.jpg\n",
        )
        .unwrap();

        let payload = load_payload(&path).unwrap();
        assert_eq!(payload.belongings, "red collar");
        assert_eq!(payload.values.len(), 2);
        assert_eq!(payload.photos.len(), 1);
    }
}
