//! Transfer audit log
//!
//! Appends one JSON line per coordinator transition. Logging never blocks a
//! transfer: write failures are reported as warnings and otherwise ignored.

use super::state::PendingTransfer;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;
use uuid::Uuid;

/// Coordinator transition recorded in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditEvent {
    Initiated,
    Signed,
    Submitted,
    Completed,
    Failed,
    Cancelled,
}

/// Entry in the audit log
#[derive(Debug, Clone, Serialize)]
pub struct AuditEntry {
    timestamp: DateTime<Utc>,
    attempt_id: String,
    event: AuditEvent,
    transfer_id: Option<String>,
    from_address: Option<String>,
    to_address: Option<String>,
    amount: Option<f64>,
    amount_usd: Option<f64>,
    message: Option<String>,
    signature: Option<String>,
    transaction_id: Option<String>,
    error: Option<String>,
}

impl AuditEntry {
    pub(crate) fn new(attempt_id: Uuid, event: AuditEvent) -> Self {
        Self {
            timestamp: Utc::now(),
            attempt_id: attempt_id.to_string(),
            event,
            transfer_id: None,
            from_address: None,
            to_address: None,
            amount: None,
            amount_usd: None,
            message: None,
            signature: None,
            transaction_id: None,
            error: None,
        }
    }

    /// Copy the transfer terms into the entry
    pub(crate) fn with_pending(mut self, pending: &PendingTransfer) -> Self {
        self.transfer_id = Some(pending.transfer_id.to_string());
        self.from_address = Some(pending.from_address.clone());
        self.to_address = Some(pending.to_address.clone());
        self.amount = Some(pending.amount);
        self.amount_usd = pending.amount_usd;
        self.message = Some(pending.message.clone());
        self
    }

    pub(crate) fn with_addresses(mut self, from: &str, to: &str) -> Self {
        self.from_address = Some(from.to_string());
        self.to_address = Some(to.to_string());
        self
    }

    pub(crate) fn with_signature(mut self, signature: &str) -> Self {
        self.signature = Some(signature.to_string());
        self
    }

    pub(crate) fn with_transaction_id(mut self, transaction_id: Option<String>) -> Self {
        self.transaction_id = transaction_id;
        self
    }

    pub(crate) fn with_error(mut self, error: impl ToString) -> Self {
        self.error = Some(error.to_string());
        self
    }
}

/// Writer for audit log entries
struct AuditLogWriter {
    path: PathBuf,
}

impl AuditLogWriter {
    fn write(&self, entry: &AuditEntry) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;

        let json = serde_json::to_string(entry)?;
        writeln!(file, "{}", json)?;
        Ok(())
    }
}

/// Append-only JSONL log shared by coordinators
#[derive(Clone)]
pub struct TransferAuditLog {
    writer: Arc<Mutex<AuditLogWriter>>,
}

impl TransferAuditLog {
    /// # Arguments
    /// * `log_path` - Path to the audit log file (JSONL format)
    pub fn new(log_path: impl Into<PathBuf>) -> Self {
        Self {
            writer: Arc::new(Mutex::new(AuditLogWriter {
                path: log_path.into(),
            })),
        }
    }

    pub async fn record(&self, entry: AuditEntry) {
        let writer = self.writer.lock().await;
        if let Err(e) = writer.write(&entry) {
            tracing::warn!(error = %e, path = %writer.path.display(), "Failed to write audit log entry");
        }
    }
}
