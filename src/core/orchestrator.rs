//! Side-effect orchestrator.
//!
//! Turns stage transitions into writes against the injected collaborators.
//! Every operation reads the task immediately before computing and writes
//! it back with a compare-and-swap on the version captured by that read.
//! Secondary writes (inventory, gallery, notifier) happen only after the
//! primary write commits and are reported as warnings when they fail.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::adapters::{
    DeliveryNotice, GalleryStore, InventoryStore, Ledger, Notifier, StoreError, TaskDelta,
    TaskStore, TemplateStore, VersionedTask,
};
use crate::domain::{
    merge_used_products, products_cost, Appointment, PaymentMethod, ServiceTask, StageKey,
    StageRecord, StageTag, TemplateKind, TemplateSnapshot, UsedProductDelta, ValueMap,
};

use super::audit_codec;
use super::error::{SideEffectWarning, WorkflowError};
use super::retry::RetryPolicy;
use super::schema;
use super::stage::{self, NextStep, TargetCheck, Transition};

/// Collaborators the orchestrator writes through
#[derive(Clone)]
pub struct Collaborators {
    pub tasks: Arc<dyn TaskStore>,
    pub templates: Arc<dyn TemplateStore>,
    pub inventory: Arc<dyn InventoryStore>,
    pub gallery: Arc<dyn GalleryStore>,
    pub ledger: Arc<dyn Ledger>,
    pub notifier: Arc<dyn Notifier>,
}

/// Data entered at the intake or outtake boundary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StagePayloadInput {
    #[serde(default)]
    pub belongings: String,

    #[serde(default)]
    pub analysis: String,

    #[serde(default)]
    pub grooming_notes: String,

    /// Values keyed by template field id
    #[serde(default)]
    pub values: ValueMap,

    #[serde(default)]
    pub photos: Vec<String>,
}

/// A request to move a task one step forward
#[derive(Debug, Clone, Default)]
pub struct AdvanceRequest {
    /// Legacy checklist items ticked off
    pub checked_item_ids: Vec<String>,

    /// Intake/outtake data for the boundary being crossed
    pub stage_payload: Option<StagePayloadInput>,

    /// Products consumed since the last advance
    pub used_products: Vec<UsedProductDelta>,

    /// Step the caller expects to reach; makes retries idempotent
    pub target_step: Option<usize>,
}

impl AdvanceRequest {
    pub fn to_step(mut self, target: usize) -> Self {
        self.target_step = Some(target);
        self
    }

    /// Whether the request asks for anything to be recorded on the task
    fn carries_input(&self) -> bool {
        self.stage_payload.is_some()
            || self.used_products.iter().any(|p| p.quantity > 0)
            || self.checked_item_ids.iter().any(|id| !id.trim().is_empty())
    }
}

/// Suggested amount handed to delivery confirmation
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeliveryQuote {
    pub task_id: Uuid,
    pub base_price: Decimal,
    pub products_cost: Decimal,
    /// Default for the confirmed amount; the caller may edit it
    pub computed_amount: Decimal,
}

impl DeliveryQuote {
    pub fn for_task(task: &ServiceTask) -> Self {
        let cost = products_cost(&task.used_products);
        Self {
            task_id: task.id,
            base_price: task.base_price,
            products_cost: cost,
            computed_amount: task.base_price + cost,
        }
    }
}

/// Result of an advance
#[derive(Debug, Clone)]
pub struct AdvanceOutcome {
    /// Task as written (or as read, when nothing was written)
    pub task: ServiceTask,

    /// The move applied; `None` for replays and terminal steps
    pub transition: Option<Transition>,

    /// Present once the task sits on its pre-terminal step
    pub delivery: Option<DeliveryQuote>,

    /// Non-fatal secondary failures
    pub warnings: Vec<SideEffectWarning>,

    /// The pinned target had already been reached
    pub replayed: bool,
}

impl AdvanceOutcome {
    fn unchanged(task: ServiceTask, replayed: bool) -> Self {
        let delivery = (task.status == StageKey::Ready).then(|| DeliveryQuote::for_task(&task));
        Self {
            task,
            transition: None,
            delivery,
            warnings: Vec::new(),
            replayed,
        }
    }
}

/// Result of a confirmed delivery
#[derive(Debug, Clone)]
pub struct DeliveryReceipt {
    pub task: ServiceTask,
    pub transaction_id: Uuid,
    pub amount: Decimal,
    pub payment_method: PaymentMethod,
    pub warnings: Vec<SideEffectWarning>,
}

/// Everything an advance will write, computed before any I/O
#[derive(Debug)]
struct AdvancePlan {
    delta: TaskDelta,
    photos: Vec<String>,
    warnings: Vec<SideEffectWarning>,
}

/// Idempotency key for an advance: `{task_id}:{target_step}`
pub fn idempotency_key(task_id: Uuid, target_step: usize) -> String {
    format!("{}:{}", task_id, target_step)
}

/// Main workflow orchestrator
pub struct Orchestrator {
    stores: Collaborators,
}

impl Orchestrator {
    /// Create an orchestrator over explicit collaborators
    pub fn new(stores: Collaborators) -> Self {
        Self { stores }
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.stores
    }

    /// Create a task for an appointment, snapshotting steps, templates and
    /// size-tier pricing from the catalog
    #[instrument(skip(self, appointment), fields(appointment = %appointment.id, service = %appointment.service_id))]
    pub async fn create_task(&self, appointment: &Appointment) -> Result<ServiceTask, WorkflowError> {
        let templates = &self.stores.templates;

        let service = templates
            .service(&appointment.service_id)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => {
                    WorkflowError::UnknownService(appointment.service_id.clone())
                }
                other => WorkflowError::Collaborator(other),
            })?;

        let category = templates
            .category(&service.category)
            .await
            .map_err(|e| match e {
                StoreError::NotFound(_) => WorkflowError::UnknownCategory(service.category.clone()),
                other => WorkflowError::Collaborator(other),
            })?;

        let base_price = service.price_for(appointment.size_tier).ok_or_else(|| {
            WorkflowError::UnpricedSizeTier {
                service_id: service.id.clone(),
                tier: appointment.size_tier,
            }
        })?;

        let intake_template = templates
            .template_for(&service.id, TemplateKind::Intake)
            .await
            .map_err(WorkflowError::Collaborator)?
            .map(|t| schema::snapshot(&t));
        let outtake_template = templates
            .template_for(&service.id, TemplateKind::Outtake)
            .await
            .map_err(WorkflowError::Collaborator)?
            .map(|t| schema::snapshot(&t));

        let stage_steps = stage::steps_for(&category);
        let task = ServiceTask {
            id: Uuid::new_v4(),
            appointment_id: appointment.id.clone(),
            pet_id: appointment.pet_id.clone(),
            owner_id: appointment.owner_id.clone(),
            service_id: service.id.clone(),
            size_tier: appointment.size_tier,
            base_price,
            duration_minutes: service.duration_for(appointment.size_tier),
            status: stage_steps[0].key,
            stage_steps,
            current_step_index: 0,
            audit_log: Vec::new(),
            intake_template,
            outtake_template,
            used_products: Default::default(),
            checklist_items: service.checklist.clone(),
            created_at: Utc::now(),
            finished_at: None,
        };

        self.stores
            .tasks
            .insert(&task)
            .await
            .map_err(|e| WorkflowError::from_task_store(task.id, e))?;

        info!(
            task_id = %task.id,
            steps = task.stage_steps.len(),
            base_price = %task.base_price,
            "Task created"
        );
        Ok(task)
    }

    /// Current state of a task
    pub async fn get_task(&self, task_id: Uuid) -> Result<ServiceTask, WorkflowError> {
        Ok(self.read(task_id).await?.task)
    }

    /// Move a task one step forward and apply the side effects of the move
    #[instrument(skip(self, request), fields(task_id = %task_id))]
    pub async fn advance(
        &self,
        task_id: Uuid,
        request: AdvanceRequest,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        let VersionedTask { task, version } = self.read(task_id).await?;

        if task.is_finished() {
            return Err(WorkflowError::AlreadyFinished(task_id));
        }
        stage::check_task(&task).map_err(|e| WorkflowError::from_stage(task_id, e))?;

        if let Some(target) = request.target_step {
            let check = stage::check_target(&task, target)
                .map_err(|e| WorkflowError::from_stage(task_id, e))?;
            if check == TargetCheck::AlreadyApplied {
                info!(key = %idempotency_key(task_id, target), "Advance already applied, skipping");
                return Ok(AdvanceOutcome::unchanged(task, true));
            }
        }

        let transition = match stage::compute_next(&task)
            .map_err(|e| WorkflowError::from_stage(task_id, e))?
        {
            NextStep::Advance(transition) => transition,
            NextStep::Terminal => {
                if request.carries_input() {
                    warn!("Advance on the last step carries input that cannot be recorded");
                    return Err(WorkflowError::NothingToApply {
                        task_id,
                        status: task.status,
                    });
                }
                debug!("Task is on its last step, routing to delivery");
                return Ok(AdvanceOutcome::unchanged(task, false));
            }
        };

        let plan = plan_advance(&task, &transition, &request, Utc::now())?;

        self.stores
            .tasks
            .write(task_id, version, &plan.delta)
            .await
            .map_err(|e| {
                let err = WorkflowError::from_task_store(task_id, e);
                warn!(error = %err, "Advance not persisted");
                err
            })?;

        let mut task = task;
        plan.delta.apply(&mut task);
        let mut warnings = plan.warnings;

        for delta in request.used_products.iter().filter(|d| d.quantity > 0) {
            if let Err(e) = self
                .stores
                .inventory
                .decrement_stock(&delta.product_id, delta.quantity)
                .await
            {
                warn!(product = %delta.product_id, error = %e, "Stock decrement failed");
                warnings.push(SideEffectWarning::Inventory {
                    product_id: delta.product_id.clone(),
                    quantity: delta.quantity,
                    error: e.to_string(),
                });
            }
        }

        if !plan.photos.is_empty() {
            match self
                .stores
                .gallery
                .append_photos(&task.pet_id, &plan.photos)
                .await
            {
                Ok(added) => debug!(pet = %task.pet_id, added, "Gallery updated"),
                Err(e) => {
                    warn!(pet = %task.pet_id, error = %e, "Gallery append failed");
                    warnings.push(SideEffectWarning::Gallery {
                        pet_id: task.pet_id.clone(),
                        error: e.to_string(),
                    });
                }
            }
        }

        let delivery = transition
            .entering_pre_terminal
            .then(|| DeliveryQuote::for_task(&task));

        info!(
            step = transition.next_step_index,
            status = %transition.next_status,
            warnings = warnings.len(),
            "Task advanced"
        );

        Ok(AdvanceOutcome {
            task,
            transition: Some(transition),
            delivery,
            warnings,
            replayed: false,
        })
    }

    /// Advance, retrying version conflicts against freshly read state.
    ///
    /// The target step is pinned from the first read, so a retry that finds
    /// the move already made by another caller returns without repeating it.
    #[instrument(skip(self, request, policy), fields(task_id = %task_id))]
    pub async fn advance_with_retry(
        &self,
        task_id: Uuid,
        request: AdvanceRequest,
        policy: &RetryPolicy,
    ) -> Result<AdvanceOutcome, WorkflowError> {
        let mut request = request;
        if request.target_step.is_none() {
            let current = self.read(task_id).await?.task.current_step_index;
            request.target_step = Some(current + 1);
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            match self.advance(task_id, request.clone()).await {
                Err(e) if e.is_retryable() && policy.may_retry_after(attempt) => {
                    let delay = policy.backoff_after(attempt);
                    warn!(
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Advance lost a version race, retrying"
                    );
                    tokio::time::sleep(delay).await;
                }
                result => return result,
            }
        }
    }

    /// Quote the delivery amount for a task sitting on its ready step
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn open_delivery(&self, task_id: Uuid) -> Result<DeliveryQuote, WorkflowError> {
        let VersionedTask { task, .. } = self.read(task_id).await?;
        ensure_deliverable(&task)?;

        let quote = DeliveryQuote::for_task(&task);
        info!(amount = %quote.computed_amount, "Delivery opened");
        Ok(quote)
    }

    /// Finalize a delivery: mark finished, record income, signal notifier.
    ///
    /// The ledger is never written unless the finished status was.
    #[instrument(skip(self), fields(task_id = %task_id))]
    pub async fn confirm_delivery(
        &self,
        task_id: Uuid,
        amount: Decimal,
        payment_method: PaymentMethod,
    ) -> Result<DeliveryReceipt, WorkflowError> {
        if amount.is_sign_negative() {
            return Err(WorkflowError::InvalidAmount(amount));
        }

        let VersionedTask { mut task, version } = self.read(task_id).await?;
        ensure_deliverable(&task)?;

        let finished_at = Utc::now();
        let delta = TaskDelta {
            status: Some(StageKey::Finished),
            finished_at: Some(finished_at),
            ..Default::default()
        };
        self.stores
            .tasks
            .write(task_id, version, &delta)
            .await
            .map_err(|e| {
                let err = WorkflowError::from_task_store(task_id, e);
                error!(error = %err, "Finalize failed, no ledger entry written");
                err
            })?;
        delta.apply(&mut task);

        let description = format!(
            "Service {} for pet {} (task {}, paid by {})",
            task.service_id, task.pet_id, task.id, payment_method
        );
        let transaction_id = match self
            .stores
            .ledger
            .record_income(&task.owner_id, amount, &description)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                error!(
                    %amount,
                    error = %e,
                    "Task finished but ledger entry failed; manual reconciliation required"
                );
                return Err(WorkflowError::InconsistentFinalization {
                    task_id,
                    amount,
                    source: e,
                });
            }
        };

        let mut warnings = Vec::new();
        let notice = DeliveryNotice {
            task_id,
            pet_id: task.pet_id.clone(),
            owner_id: task.owner_id.clone(),
            amount,
            payment_method,
            transaction_id,
        };
        let notifier = &self.stores.notifier;
        if let Err(e) = notifier.notify_delivery(&notice).await {
            warn!(notifier = notifier.name(), error = %e, "Delivery notification failed");
            warnings.push(SideEffectWarning::Notify {
                notifier: notifier.name().to_string(),
                error: e.to_string(),
            });
        }

        info!(%amount, %payment_method, %transaction_id, "Delivery confirmed");
        Ok(DeliveryReceipt {
            task,
            transaction_id,
            amount,
            payment_method,
            warnings,
        })
    }

    async fn read(&self, task_id: Uuid) -> Result<VersionedTask, WorkflowError> {
        self.stores
            .tasks
            .read(task_id)
            .await
            .map_err(|e| WorkflowError::from_task_store(task_id, e))
    }
}

fn ensure_deliverable(task: &ServiceTask) -> Result<(), WorkflowError> {
    match task.status {
        StageKey::Finished => Err(WorkflowError::AlreadyFinished(task.id)),
        StageKey::Ready => Ok(()),
        status => Err(WorkflowError::NotReadyForDelivery {
            task_id: task.id,
            status,
        }),
    }
}

/// Compute the combined write and secondary effects of one transition
fn plan_advance(
    task: &ServiceTask,
    transition: &Transition,
    request: &AdvanceRequest,
    now: DateTime<Utc>,
) -> Result<AdvancePlan, WorkflowError> {
    let mut append_log = Vec::new();
    let mut photos = Vec::new();
    let mut warnings = Vec::new();

    let already_checked = audit_codec::checked_items(&task.audit_log);
    for id in &request.checked_item_ids {
        let id = id.trim();
        if id.is_empty() || audit_codec::is_tagged(id) {
            warn!(item = %id, "Ignoring checklist id that collides with a log tag");
            continue;
        }
        if already_checked.contains(&id) || append_log.iter().any(|e: &String| e == id) {
            continue;
        }
        append_log.push(id.to_string());
    }

    let mut payload_used = false;

    if transition.leaving_intake {
        payload_used = true;
        if let Some(entry) = stage_entry(
            task,
            StageTag::CheckIn,
            task.intake_template.as_ref(),
            request.stage_payload.as_ref(),
            &mut photos,
            &mut warnings,
        )? {
            append_log.push(entry);
        }
    }

    if transition.entering_stage_key == StageKey::InProgress {
        if audit_codec::has_timer(&task.audit_log) {
            warn!("Timer already started, not appending another");
            warnings.push(SideEffectWarning::DuplicateEntry {
                entry: "TIMER".to_string(),
            });
        } else {
            append_log.push(audit_codec::encode_timer_start(now));
        }
    }

    if transition.entering_pre_terminal {
        payload_used = true;
        if let Some(entry) = stage_entry(
            task,
            StageTag::CheckOut,
            task.outtake_template.as_ref(),
            request.stage_payload.as_ref(),
            &mut photos,
            &mut warnings,
        )? {
            append_log.push(entry);
        }
    }

    if request.stage_payload.is_some() && !payload_used {
        warn!(
            entering = %transition.entering_stage_key,
            "Stage payload ignored; no intake or outtake boundary crossed"
        );
        warnings.push(SideEffectWarning::IgnoredPayload {
            entering: transition.entering_stage_key.to_string(),
        });
    }

    let used_products = if request.used_products.is_empty() {
        None
    } else {
        let mut merged = task.used_products.clone();
        merge_used_products(&mut merged, &request.used_products).map_err(|e| {
            WorkflowError::InvalidQuantity {
                task_id: task.id,
                product_id: e.product_id,
            }
        })?;
        Some(merged)
    };

    Ok(AdvancePlan {
        delta: TaskDelta {
            append_log,
            current_step_index: Some(transition.next_step_index),
            status: Some(transition.next_status),
            used_products,
            finished_at: None,
        },
        photos,
        warnings,
    })
}

/// Encode the stage payload for one boundary, unless the log already has it
fn stage_entry(
    task: &ServiceTask,
    tag: StageTag,
    snapshot: Option<&TemplateSnapshot>,
    input: Option<&StagePayloadInput>,
    photos: &mut Vec<String>,
    warnings: &mut Vec<SideEffectWarning>,
) -> Result<Option<String>, WorkflowError> {
    if audit_codec::count_tagged(&task.audit_log, tag) > 0 {
        warn!(%tag, "Stage payload already recorded, not appending another");
        warnings.push(SideEffectWarning::DuplicateEntry {
            entry: tag.to_string(),
        });
        return Ok(None);
    }

    let empty = StagePayloadInput::default();
    let input = input.unwrap_or(&empty);

    let values = match snapshot {
        Some(snapshot) => {
            let values = schema::coerce_values(snapshot, &input.values)?;
            let missing = schema::missing_required(snapshot, &values);
            if !missing.is_empty() {
                warn!(%tag, fields = ?missing, "Required checklist fields left empty");
            }
            values
        }
        None => input.values.clone(),
    };

    let mut record_photos: Vec<String> = Vec::new();
    let field_photos = snapshot
        .map(|s| schema::photo_values(s, &values))
        .unwrap_or_default();
    for url in input.photos.iter().chain(field_photos.iter()) {
        let url = url.trim();
        if !url.is_empty() && !record_photos.iter().any(|p| p == url) {
            record_photos.push(url.to_string());
        }
    }
    for url in &record_photos {
        if !photos.contains(url) {
            photos.push(url.clone());
        }
    }

    let record = StageRecord {
        belongings: input.belongings.clone(),
        analysis: input.analysis.clone(),
        grooming_notes: input.grooming_notes.clone(),
        dynamic_values: values,
        photos: record_photos,
        template_name: snapshot.map(|s| s.name().to_string()),
    };

    Ok(Some(audit_codec::encode_stage_payload(tag, &record)?))
}
