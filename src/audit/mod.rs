//! Append-only transaction log
//!
//! Every recorded event is appended in memory and the whole log is rewritten
//! to a flat JSON array file. The file is reloaded wholesale at startup; a
//! corrupt or missing file degrades to an empty log with a warning.

use crate::models::LogEntry;
use crate::Result;
use chrono::Utc;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

pub struct TransactionLog {
    path: PathBuf,
    entries: RwLock<Vec<LogEntry>>,
}

impl TransactionLog {
    /// Open the log, loading any existing entries from disk.
    pub fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref().to_path_buf();
        let entries = match fs::read(&path) {
            Ok(bytes) => match serde_json::from_slice::<Vec<LogEntry>>(&bytes) {
                Ok(entries) => {
                    info!("Loaded {} transaction log entries from {:?}", entries.len(), path);
                    entries
                }
                Err(e) => {
                    warn!("Could not parse existing transaction log: {}", e);
                    Vec::new()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => {
                warn!("Could not load existing transaction log: {}", e);
                Vec::new()
            }
        };

        Self {
            path,
            entries: RwLock::new(entries),
        }
    }

    /// Record an event. The `status` flag mirrors `data["success"]`. Returns
    /// the generated transaction id, `TYPE_<8 hex>`.
    pub async fn record(&self, kind: &str, data: Value) -> Result<String> {
        let transaction_id = format!(
            "{}_{}",
            kind.to_uppercase(),
            &Uuid::new_v4().simple().to_string()[..8]
        );

        let entry = LogEntry {
            transaction_id: transaction_id.clone(),
            kind: kind.to_string(),
            timestamp: Utc::now(),
            status: data
                .get("success")
                .and_then(Value::as_bool)
                .unwrap_or(false),
            data,
        };

        let mut entries = self.entries.write().await;
        entries.push(entry);
        self.persist(&entries).await?;

        info!("Transaction logged: {} ({})", transaction_id, kind);
        Ok(transaction_id)
    }

    // Full rewrite per entry; writes are serialized by the entries lock.
    async fn persist(&self, entries: &[LogEntry]) -> Result<()> {
        let json = serde_json::to_vec_pretty(entries)?;
        tokio::fs::write(&self.path, json).await?;
        Ok(())
    }

    /// Last `limit` entries, optionally filtered by type, oldest first.
    pub async fn query(&self, kind: Option<&str>, limit: usize) -> Vec<LogEntry> {
        let entries = self.entries.read().await;
        let filtered: Vec<LogEntry> = match kind {
            Some(kind) => entries.iter().filter(|e| e.kind == kind).cloned().collect(),
            None => entries.clone(),
        };
        let start = filtered.len().saturating_sub(limit);
        filtered[start..].to_vec()
    }

    pub async fn get(&self, transaction_id: &str) -> Option<LogEntry> {
        let entries = self.entries.read().await;
        entries
            .iter()
            .find(|e| e.transaction_id == transaction_id)
            .cloned()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn record_assigns_typed_id_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path().join("transactions.json"));

        let id = log
            .record("mpesa_payment", json!({"amount": 112.5, "success": true}))
            .await
            .unwrap();
        assert!(id.starts_with("MPESA_PAYMENT_"));

        let entry = log.get(&id).await.unwrap();
        assert!(entry.status);
        assert_eq!(entry.kind, "mpesa_payment");

        let failed = log
            .record("token_transfer", json!({"error": "Network congestion"}))
            .await
            .unwrap();
        assert!(!log.get(&failed).await.unwrap().status);
    }

    #[tokio::test]
    async fn log_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");

        {
            let log = TransactionLog::open(&path);
            log.record("sms", json!({"success": true})).await.unwrap();
            log.record("stock_purchase", json!({"success": true}))
                .await
                .unwrap();
        }

        let reloaded = TransactionLog::open(&path);
        assert_eq!(reloaded.len().await, 2);
        assert_eq!(reloaded.query(Some("sms"), 50).await.len(), 1);
    }

    #[tokio::test]
    async fn corrupt_file_degrades_to_empty_log() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        std::fs::write(&path, b"not json").unwrap();

        let log = TransactionLog::open(&path);
        assert!(log.is_empty().await);

        // And it can still record afterwards.
        log.record("sms", json!({"success": true})).await.unwrap();
        assert_eq!(log.len().await, 1);
    }

    #[tokio::test]
    async fn query_filters_and_limits() {
        let dir = tempfile::tempdir().unwrap();
        let log = TransactionLog::open(dir.path().join("transactions.json"));

        for i in 0..5 {
            log.record("sms", json!({"success": true, "n": i}))
                .await
                .unwrap();
        }
        log.record("token_transfer", json!({"success": true}))
            .await
            .unwrap();

        assert_eq!(log.query(None, 3).await.len(), 3);
        assert_eq!(log.query(Some("sms"), 50).await.len(), 5);
        assert_eq!(log.query(Some("token_transfer"), 50).await.len(), 1);
        assert!(log.query(Some("unknown"), 50).await.is_empty());

        // Limit keeps the most recent entries.
        let last = log.query(Some("sms"), 2).await;
        assert_eq!(last[0].data["n"], 3);
        assert_eq!(last[1].data["n"], 4);
    }

    #[tokio::test]
    async fn concurrent_records_all_reach_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("transactions.json");
        let log = std::sync::Arc::new(TransactionLog::open(&path));

        let tasks: Vec<_> = (0..8)
            .map(|i| {
                let log = log.clone();
                tokio::spawn(
                    async move { log.record("sms", json!({"success": true, "n": i})).await },
                )
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(log.len().await, 8);

        let reloaded = TransactionLog::open(&path);
        assert_eq!(reloaded.len().await, 8);
    }
}
