//! In-process collaborator backends.
//!
//! Each store can be switched into a failing mode so callers can exercise
//! partial-failure paths without a real backend.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::domain::{LedgerTransaction, Product, ServiceTask};

use super::{
    DeliveryNotice, GalleryStore, InventoryStore, Ledger, Notifier, StoreError, TaskDelta,
    TaskStore, Version, VersionedTask,
};

fn injected(failing: &AtomicBool, what: &str) -> Result<(), StoreError> {
    if failing.load(Ordering::SeqCst) {
        return Err(StoreError::Backend(format!("{} unavailable", what)));
    }
    Ok(())
}

/// Task store backed by a map
#[derive(Debug, Default)]
pub struct MemoryTaskStore {
    tasks: Mutex<HashMap<Uuid, (ServiceTask, Version)>>,
    fail_writes: AtomicBool,
}

impl MemoryTaskStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent `write` fail with a backend error
    pub fn set_failing_writes(&self, failing: bool) {
        self.fail_writes.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl TaskStore for MemoryTaskStore {
    async fn insert(&self, task: &ServiceTask) -> Result<Version, StoreError> {
        let mut tasks = self.tasks.lock().await;
        if tasks.contains_key(&task.id) {
            return Err(StoreError::AlreadyExists(format!("task {}", task.id)));
        }
        tasks.insert(task.id, (task.clone(), Version::initial()));
        Ok(Version::initial())
    }

    async fn read(&self, task_id: Uuid) -> Result<VersionedTask, StoreError> {
        let tasks = self.tasks.lock().await;
        let (task, version) = tasks
            .get(&task_id)
            .ok_or_else(|| StoreError::NotFound(format!("task {}", task_id)))?;

        Ok(VersionedTask {
            task: task.clone(),
            version: *version,
        })
    }

    async fn write(
        &self,
        task_id: Uuid,
        expected: Version,
        delta: &TaskDelta,
    ) -> Result<Version, StoreError> {
        injected(&self.fail_writes, "task store")?;

        let mut tasks = self.tasks.lock().await;
        let (task, version) = tasks
            .get_mut(&task_id)
            .ok_or_else(|| StoreError::NotFound(format!("task {}", task_id)))?;

        if *version != expected {
            return Err(StoreError::StaleVersion { task_id, expected });
        }

        delta.apply(task);
        *version = version.next();
        Ok(*version)
    }
}

/// Inventory backed by a product map
#[derive(Debug, Default)]
pub struct MemoryInventory {
    products: Mutex<HashMap<String, Product>>,
    failing: AtomicBool,
}

impl MemoryInventory {
    pub fn new(products: impl IntoIterator<Item = Product>) -> Self {
        Self {
            products: Mutex::new(products.into_iter().map(|p| (p.id.clone(), p)).collect()),
            failing: AtomicBool::new(false),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn stock(&self, product_id: &str) -> Option<u32> {
        self.products.lock().await.get(product_id).map(|p| p.stock)
    }
}

#[async_trait]
impl InventoryStore for MemoryInventory {
    async fn decrement_stock(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        injected(&self.failing, "inventory")?;

        let mut products = self.products.lock().await;
        let product = products
            .get_mut(product_id)
            .ok_or_else(|| StoreError::NotFound(format!("product {}", product_id)))?;

        if product.stock < quantity {
            return Err(StoreError::InsufficientStock {
                product_id: product_id.to_string(),
                available: product.stock,
                requested: quantity,
            });
        }
        product.stock -= quantity;
        Ok(())
    }

    async fn list_available(&self, _tenant_id: &str) -> Result<Vec<Product>, StoreError> {
        injected(&self.failing, "inventory")?;

        let mut available: Vec<Product> = self
            .products
            .lock()
            .await
            .values()
            .filter(|p| p.stock > 0)
            .cloned()
            .collect();
        available.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(available)
    }
}

/// Photo galleries keyed by pet id
#[derive(Debug, Default)]
pub struct MemoryGallery {
    photos: Mutex<HashMap<String, Vec<String>>>,
    failing: AtomicBool,
}

impl MemoryGallery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn photos(&self, pet_id: &str) -> Vec<String> {
        self.photos
            .lock()
            .await
            .get(pet_id)
            .cloned()
            .unwrap_or_default()
    }
}

#[async_trait]
impl GalleryStore for MemoryGallery {
    async fn append_photos(&self, pet_id: &str, urls: &[String]) -> Result<usize, StoreError> {
        injected(&self.failing, "gallery")?;

        let mut photos = self.photos.lock().await;
        let gallery = photos.entry(pet_id.to_string()).or_default();
        let before = gallery.len();
        for url in urls {
            if !gallery.contains(url) {
                gallery.push(url.clone());
            }
        }
        Ok(gallery.len() - before)
    }
}

/// Ledger keeping transactions in a vector
#[derive(Debug, Default)]
pub struct MemoryLedger {
    transactions: Mutex<Vec<LedgerTransaction>>,
    failing: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn transactions(&self) -> Vec<LedgerTransaction> {
        self.transactions.lock().await.clone()
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn record_income(
        &self,
        owner_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Uuid, StoreError> {
        injected(&self.failing, "ledger")?;

        let transaction = LedgerTransaction {
            id: Uuid::new_v4(),
            owner_id: owner_id.to_string(),
            amount,
            description: description.to_string(),
            recorded_at: Utc::now(),
        };
        let id = transaction.id;
        self.transactions.lock().await.push(transaction);
        Ok(id)
    }
}

/// Notifier that records every notice it receives
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    notices: Mutex<Vec<DeliveryNotice>>,
    failing: AtomicBool,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn notices(&self) -> Vec<DeliveryNotice> {
        self.notices.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MemoryNotifier {
    fn name(&self) -> &str {
        "memory"
    }

    async fn notify_delivery(&self, notice: &DeliveryNotice) -> Result<(), StoreError> {
        injected(&self.failing, "notifier")?;
        self.notices.lock().await.push(notice.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: &str, stock: u32) -> Product {
        Product {
            id: id.to_string(),
            name: id.to_uppercase(),
            unit_price: Decimal::from(10),
            stock,
        }
    }

    #[tokio::test]
    async fn test_inventory_decrement() {
        let inventory = MemoryInventory::new([product("shampoo", 3), product("bow", 0)]);

        inventory.decrement_stock("shampoo", 2).await.unwrap();
        assert_eq!(inventory.stock("shampoo").await, Some(1));

        let err = inventory.decrement_stock("shampoo", 5).await.unwrap_err();
        assert!(matches!(err, StoreError::InsufficientStock { available: 1, .. }));

        let available = inventory.list_available("tenant").await.unwrap();
        assert_eq!(available.len(), 1);
    }

    #[tokio::test]
    async fn test_gallery_skips_duplicates() {
        let gallery = MemoryGallery::new();
        let urls = vec!["a.jpg".to_string(), "b.jpg".to_string()];

        assert_eq!(gallery.append_photos("rex", &urls).await.unwrap(), 2);
        assert_eq!(gallery.append_photos("rex", &urls[..1]).await.unwrap(), 0);
        assert_eq!(gallery.photos("rex").await, urls);
    }

    #[tokio::test]
    async fn test_failing_ledger() {
        let ledger = MemoryLedger::new();
        ledger.set_failing(true);

        assert!(ledger
            .record_income("owner", Decimal::from(70), "groom")
            .await
            .is_err());
        assert!(ledger.transactions().await.is_empty());
    }
}
