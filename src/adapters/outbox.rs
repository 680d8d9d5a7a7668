//! JSONL outbox notifier.
//!
//! Delivery notices are appended to a file that the print/notify service
//! tails. Writers take an exclusive lock so concurrent CLI invocations
//! never interleave lines.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::Utc;
use fs2::FileExt;
use serde::Serialize;
use tracing::debug;

use super::{DeliveryNotice, Notifier, StoreError};

/// Notifier writing one JSON line per delivery
pub struct OutboxNotifier {
    path: PathBuf,
}

impl OutboxNotifier {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, notice: &DeliveryNotice) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        file.lock_exclusive()?;

        #[derive(Serialize)]
        struct OutboxLine<'a> {
            ts: String,
            kind: &'static str,
            #[serde(flatten)]
            notice: &'a DeliveryNotice,
        }

        let line = OutboxLine {
            ts: Utc::now().to_rfc3339(),
            kind: "delivery",
            notice,
        };
        let json = serde_json::to_string(&line)?;

        writeln!(file, "{}", json)?;
        file.flush()?;

        // Lock is released when file is dropped
        Ok(())
    }
}

#[async_trait]
impl Notifier for OutboxNotifier {
    fn name(&self) -> &str {
        "outbox"
    }

    async fn notify_delivery(&self, notice: &DeliveryNotice) -> Result<(), StoreError> {
        self.append(notice).map_err(|e| {
            StoreError::Backend(format!("outbox {}: {}", self.path.display(), e))
        })?;
        debug!(task_id = %notice.task_id, path = %self.path.display(), "Delivery notice queued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PaymentMethod;
    use rust_decimal::Decimal;
    use tempfile::TempDir;
    use uuid::Uuid;

    #[tokio::test]
    async fn test_outbox_appends_lines() {
        let temp = TempDir::new().unwrap();
        let notifier = OutboxNotifier::new(temp.path().join("out").join("outbox.jsonl"));

        let notice = DeliveryNotice {
            task_id: Uuid::new_v4(),
            pet_id: "rex".to_string(),
            owner_id: "ana".to_string(),
            amount: Decimal::from(70),
            payment_method: PaymentMethod::Pix,
            transaction_id: Uuid::new_v4(),
        };
        notifier.notify_delivery(&notice).await.unwrap();
        notifier.notify_delivery(&notice).await.unwrap();

        let content = std::fs::read_to_string(notifier.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let parsed: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(parsed["kind"], "delivery");
        assert_eq!(parsed["pet_id"], "rex");
        assert_eq!(parsed["payment_method"], "pix");
    }
}
