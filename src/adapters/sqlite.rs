//! SQLite backend for tasks, inventory, galleries and the ledger.
//!
//! Tasks are stored as JSON next to an integer version column. Writes use
//! `UPDATE ... WHERE id = ? AND version = ?`; zero affected rows means
//! another writer got there first.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use crate::domain::{LedgerTransaction, Product, ServiceTask};

use super::{
    GalleryStore, InventoryStore, Ledger, StoreError, TaskDelta, TaskStore, Version,
    VersionedTask,
};

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS tasks (
    id          TEXT PRIMARY KEY,
    version     INTEGER NOT NULL,
    status      TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    body        TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS products (
    id          TEXT PRIMARY KEY,
    tenant_id   TEXT NOT NULL,
    name        TEXT NOT NULL,
    unit_price  TEXT NOT NULL,
    stock       INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS gallery (
    pet_id      TEXT NOT NULL,
    url         TEXT NOT NULL,
    added_at    TEXT NOT NULL,
    PRIMARY KEY (pet_id, url)
);

CREATE TABLE IF NOT EXISTS ledger (
    id          TEXT PRIMARY KEY,
    owner_id    TEXT NOT NULL,
    amount      TEXT NOT NULL,
    description TEXT NOT NULL,
    recorded_at TEXT NOT NULL
);
"#;

/// Single-file store implementing every persistence collaborator
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (and migrate) a database file
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Backend(e.to_string()))?;
        }
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::with_connection(Connection::open_in_memory()?)
    }

    fn with_connection(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn
            .lock()
            .map_err(|_| StoreError::Backend("connection mutex poisoned".to_string()))
    }

    /// Insert or replace a product listing
    pub fn upsert_product(&self, tenant_id: &str, product: &Product) -> Result<(), StoreError> {
        self.conn()?.execute(
            "INSERT INTO products (id, tenant_id, name, unit_price, stock)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                tenant_id = excluded.tenant_id,
                name = excluded.name,
                unit_price = excluded.unit_price,
                stock = excluded.stock",
            params![
                product.id,
                tenant_id,
                product.name,
                product.unit_price.to_string(),
                product.stock
            ],
        )?;
        Ok(())
    }

    /// Photos stored for a pet, oldest first
    pub fn photos(&self, pet_id: &str) -> Result<Vec<String>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT url FROM gallery WHERE pet_id = ?1 ORDER BY added_at, rowid")?;
        let urls = stmt
            .query_map(params![pet_id], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(urls)
    }

    /// Ledger entries for an owner, oldest first
    pub fn transactions(&self, owner_id: &str) -> Result<Vec<LedgerTransaction>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, owner_id, amount, description, recorded_at
             FROM ledger WHERE owner_id = ?1 ORDER BY recorded_at, rowid",
        )?;
        let rows = stmt
            .query_map(params![owner_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, owner_id, amount, description, recorded_at)| {
                Ok(LedgerTransaction {
                    id: Uuid::parse_str(&id).map_err(|e| StoreError::Backend(e.to_string()))?,
                    owner_id,
                    amount: parse_decimal(&amount)?,
                    description,
                    recorded_at: recorded_at
                        .parse()
                        .map_err(|e: chrono::ParseError| StoreError::Backend(e.to_string()))?,
                })
            })
            .collect()
    }

    /// Most recently created tasks
    pub fn list_tasks(&self, limit: usize) -> Result<Vec<ServiceTask>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT body FROM tasks ORDER BY created_at DESC LIMIT ?1")?;
        let bodies = stmt
            .query_map(params![limit as i64], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        bodies
            .iter()
            .map(|body| serde_json::from_str(body).map_err(StoreError::from))
            .collect()
    }

    fn write_task(
        &self,
        task_id: Uuid,
        expected: Version,
        delta: &TaskDelta,
    ) -> Result<Version, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;

        let row: Option<(String, i64)> = tx
            .query_row(
                "SELECT body, version FROM tasks WHERE id = ?1",
                params![task_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (body, stored) = row.ok_or_else(|| StoreError::NotFound(format!("task {}", task_id)))?;

        if stored as u64 != expected.0 {
            return Err(StoreError::StaleVersion { task_id, expected });
        }

        let mut task: ServiceTask = serde_json::from_str(&body)?;
        delta.apply(&mut task);
        let next = expected.next();

        let changed = tx.execute(
            "UPDATE tasks SET body = ?1, version = ?2, status = ?3
             WHERE id = ?4 AND version = ?5",
            params![
                serde_json::to_string(&task)?,
                next.0 as i64,
                task.status.to_string(),
                task_id.to_string(),
                expected.0 as i64
            ],
        )?;
        if changed != 1 {
            return Err(StoreError::StaleVersion { task_id, expected });
        }

        tx.commit()?;
        debug!(%task_id, version = %next, "Task written");
        Ok(next)
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, StoreError> {
    Decimal::from_str(raw).map_err(|e| StoreError::Backend(format!("bad amount '{}': {}", raw, e)))
}

#[async_trait]
impl TaskStore for SqliteStore {
    async fn insert(&self, task: &ServiceTask) -> Result<Version, StoreError> {
        let body = serde_json::to_string(task)?;
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO tasks (id, version, status, created_at, body)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                task.id.to_string(),
                Version::initial().0 as i64,
                task.status.to_string(),
                task.created_at.to_rfc3339(),
                body
            ],
        )?;
        if inserted == 0 {
            return Err(StoreError::AlreadyExists(format!("task {}", task.id)));
        }
        Ok(Version::initial())
    }

    async fn read(&self, task_id: Uuid) -> Result<VersionedTask, StoreError> {
        let conn = self.conn()?;
        let row: Option<(String, i64)> = conn
            .query_row(
                "SELECT body, version FROM tasks WHERE id = ?1",
                params![task_id.to_string()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        let (body, version) =
            row.ok_or_else(|| StoreError::NotFound(format!("task {}", task_id)))?;

        Ok(VersionedTask {
            task: serde_json::from_str(&body)?,
            version: Version(version as u64),
        })
    }

    async fn write(
        &self,
        task_id: Uuid,
        expected: Version,
        delta: &TaskDelta,
    ) -> Result<Version, StoreError> {
        self.write_task(task_id, expected, delta)
    }
}

#[async_trait]
impl InventoryStore for SqliteStore {
    async fn decrement_stock(&self, product_id: &str, quantity: u32) -> Result<(), StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            "UPDATE products SET stock = stock - ?1 WHERE id = ?2 AND stock >= ?1",
            params![quantity, product_id],
        )?;
        if changed == 1 {
            return Ok(());
        }

        let available: Option<u32> = conn
            .query_row(
                "SELECT stock FROM products WHERE id = ?1",
                params![product_id],
                |row| row.get(0),
            )
            .optional()?;
        match available {
            None => Err(StoreError::NotFound(format!("product {}", product_id))),
            Some(available) => Err(StoreError::InsufficientStock {
                product_id: product_id.to_string(),
                available,
                requested: quantity,
            }),
        }
    }

    async fn list_available(&self, tenant_id: &str) -> Result<Vec<Product>, StoreError> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, name, unit_price, stock FROM products
             WHERE tenant_id = ?1 AND stock > 0 ORDER BY name",
        )?;
        let rows = stmt
            .query_map(params![tenant_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, u32>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, name, unit_price, stock)| {
                Ok(Product {
                    id,
                    name,
                    unit_price: parse_decimal(&unit_price)?,
                    stock,
                })
            })
            .collect()
    }
}

#[async_trait]
impl GalleryStore for SqliteStore {
    async fn append_photos(&self, pet_id: &str, urls: &[String]) -> Result<usize, StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let now = Utc::now().to_rfc3339();

        let mut added = 0;
        for url in urls {
            added += tx.execute(
                "INSERT OR IGNORE INTO gallery (pet_id, url, added_at) VALUES (?1, ?2, ?3)",
                params![pet_id, url, now],
            )?;
        }

        tx.commit()?;
        Ok(added)
    }
}

#[async_trait]
impl Ledger for SqliteStore {
    async fn record_income(
        &self,
        owner_id: &str,
        amount: Decimal,
        description: &str,
    ) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();
        self.conn()?.execute(
            "INSERT INTO ledger (id, owner_id, amount, description, recorded_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                id.to_string(),
                owner_id,
                amount.to_string(),
                description,
                Utc::now().to_rfc3339()
            ],
        )?;
        Ok(id)
    }
}
