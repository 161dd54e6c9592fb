//! Transfer states and the pending transfer they carry

use crate::ledger::{InitiatedTransfer, TransferId};
use crate::wallet::normalize_address;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// Terms issued by the ledger for one transfer attempt
///
/// Lives only in memory and is consumed by a single execute.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingTransfer {
    pub transfer_id: TransferId,
    pub from_address: String,
    pub to_address: String,
    /// ETH amount after any USD conversion by the ledger
    pub amount: f64,
    pub amount_usd: Option<f64>,
    /// Exact text to sign
    pub message: String,
    pub expires_at: Option<DateTime<Utc>>,
}

impl PendingTransfer {
    pub(crate) fn from_initiated(from_address: &str, initiated: InitiatedTransfer) -> Self {
        Self {
            transfer_id: initiated.transfer_id,
            from_address: normalize_address(from_address),
            to_address: normalize_address(&initiated.to_address),
            amount: initiated.amount,
            amount_usd: initiated.amount_usd,
            message: initiated.message,
            expires_at: initiated.expires_at,
        }
    }

    /// Past its ledger-issued lifetime; unknown lifetimes never expire locally
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now > expires_at)
    }
}

/// Outcome of a completed transfer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TransferReceipt {
    pub transfer_id: String,
    pub transaction_id: Option<Value>,
    pub from_address: String,
    pub to_address: String,
    pub amount: f64,
    pub amount_usd: Option<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TransferState {
    Idle,
    Initiated(PendingTransfer),
    /// Signature requested; the transfer waits for `execute`
    Signing(PendingTransfer),
    /// Execute sent; the pending transfer has already been discarded
    Submitted,
    Completed(TransferReceipt),
    Failed { reason: String },
    Cancelled,
}

/// State tag without its payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferPhase {
    Idle,
    Initiated,
    Signing,
    Submitted,
    Completed,
    Failed,
    Cancelled,
}

impl TransferPhase {
    pub fn name(&self) -> &'static str {
        match self {
            TransferPhase::Idle => "idle",
            TransferPhase::Initiated => "initiated",
            TransferPhase::Signing => "signing",
            TransferPhase::Submitted => "submitted",
            TransferPhase::Completed => "completed",
            TransferPhase::Failed => "failed",
            TransferPhase::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for TransferPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TransferState {
    pub fn phase(&self) -> TransferPhase {
        match self {
            TransferState::Idle => TransferPhase::Idle,
            TransferState::Initiated(_) => TransferPhase::Initiated,
            TransferState::Signing(_) => TransferPhase::Signing,
            TransferState::Submitted => TransferPhase::Submitted,
            TransferState::Completed(_) => TransferPhase::Completed,
            TransferState::Failed { .. } => TransferPhase::Failed,
            TransferState::Cancelled => TransferPhase::Cancelled,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TransferState::Completed(_) | TransferState::Failed { .. } | TransferState::Cancelled
        )
    }

    pub fn pending(&self) -> Option<&PendingTransfer> {
        match self {
            TransferState::Initiated(pending) | TransferState::Signing(pending) => Some(pending),
            _ => None,
        }
    }
}
