//! Signed two-phase transfers
//!
//! A transfer runs `initiate → sign → execute` against the ledger:
//!
//! 1. `initiate` asks the ledger for terms and the exact message to sign
//! 2. `sign` signs that message with the sender's mnemonic-derived key
//! 3. `execute` submits the signature once; the pending transfer is gone
//!    afterwards whatever the ledger answers
//!
//! Each coordinator owns at most one pending transfer. Operations called in the
//! wrong state fail with `Error::Protocol` and never reach the network.

mod audit;
mod state;

pub use audit::{AuditEntry, AuditEvent, TransferAuditLog};
pub use state::{PendingTransfer, TransferPhase, TransferReceipt, TransferState};

use crate::ledger::{AmountType, ExecuteTransferRequest, InitiateTransferRequest, LedgerService};
use crate::sync::BalanceSync;
use crate::wallet::{normalize_address, KeyManager, WalletStore};
use crate::{Error, Result};
use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use uuid::Uuid;

pub struct TransferCoordinator {
    ledger: Arc<dyn LedgerService>,
    store: WalletStore,
    sync: BalanceSync,
    audit: Option<TransferAuditLog>,
    attempt_id: Uuid,
    state: TransferState,
}

impl TransferCoordinator {
    pub fn new(ledger: Arc<dyn LedgerService>, store: WalletStore) -> Self {
        let sync = BalanceSync::new(ledger.clone(), store.clone());
        Self {
            ledger,
            store,
            sync,
            audit: None,
            attempt_id: Uuid::new_v4(),
            state: TransferState::Idle,
        }
    }

    pub fn with_audit_log(mut self, audit: TransferAuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn state(&self) -> &TransferState {
        &self.state
    }

    pub fn phase(&self) -> TransferPhase {
        self.state.phase()
    }

    pub fn pending(&self) -> Option<&PendingTransfer> {
        self.state.pending()
    }

    /// Ask the ledger for transfer terms
    ///
    /// Local checks run first and leave the coordinator `Idle` when they fail.
    pub async fn initiate(
        &mut self,
        from: &str,
        to: &str,
        amount: f64,
        amount_type: AmountType,
    ) -> Result<&PendingTransfer> {
        if self.phase() != TransferPhase::Idle {
            return Err(Error::Protocol("transfer already in progress".into()));
        }

        let from = normalize_address(from);
        let to = normalize_address(to);
        if to.is_empty() {
            return Err(Error::Validation("missing recipient".into()));
        }
        if !amount.is_finite() || amount <= 0.0 {
            return Err(Error::Validation("invalid amount".into()));
        }
        if to == from {
            return Err(Error::Validation("self-transfer".into()));
        }
        if from.is_empty() {
            return Err(Error::Validation("missing sender".into()));
        }

        let request = InitiateTransferRequest {
            from_address: from.clone(),
            to_address: to.clone(),
            amount,
            amount_type,
        };

        tracing::info!(
            attempt_id = %self.attempt_id,
            from = %from,
            to = %to,
            amount,
            amount_type = %amount_type,
            "Initiating transfer"
        );

        let initiated = match self.ledger.initiate_transfer(&request).await {
            Ok(initiated) => initiated,
            Err(e) => {
                self.audit(
                    AuditEntry::new(self.attempt_id, AuditEvent::Failed)
                        .with_addresses(&from, &to)
                        .with_error(&e),
                )
                .await;
                return Err(self.fail(e));
            }
        };

        let pending = PendingTransfer::from_initiated(&from, initiated);
        tracing::info!(
            attempt_id = %self.attempt_id,
            transfer_id = %pending.transfer_id,
            amount = pending.amount,
            amount_usd = ?pending.amount_usd,
            "Transfer initiated"
        );
        self.audit(AuditEntry::new(self.attempt_id, AuditEvent::Initiated).with_pending(&pending))
            .await;

        self.state = TransferState::Initiated(pending);
        self.pending()
            .ok_or_else(|| Error::Protocol("pending transfer missing after initiate".into()))
    }

    /// Sign the ledger-issued message with the sender's key
    ///
    /// The signature is returned for `execute`; the transfer stays in `Signing`.
    pub async fn sign(&mut self) -> Result<String> {
        let pending = match std::mem::replace(&mut self.state, TransferState::Idle) {
            TransferState::Initiated(pending) => pending,
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(Error::Protocol(format!("cannot sign while {}", phase)));
            }
        };
        self.state = TransferState::Signing(pending.clone());

        if pending.is_expired_at(Utc::now()) {
            let err = Error::Protocol("transfer expired".into());
            self.audit(
                AuditEntry::new(self.attempt_id, AuditEvent::Failed)
                    .with_pending(&pending)
                    .with_error(&err),
            )
            .await;
            return Err(self.fail(err));
        }

        match self.signature_for(&pending).await {
            Ok(signature) => {
                tracing::info!(
                    attempt_id = %self.attempt_id,
                    transfer_id = %pending.transfer_id,
                    "Transfer signed"
                );
                self.audit(
                    AuditEntry::new(self.attempt_id, AuditEvent::Signed)
                        .with_pending(&pending)
                        .with_signature(&signature),
                )
                .await;
                Ok(signature)
            }
            Err(e) => {
                self.audit(
                    AuditEntry::new(self.attempt_id, AuditEvent::Failed)
                        .with_pending(&pending)
                        .with_error(&e),
                )
                .await;
                Err(self.fail(e))
            }
        }
    }

    async fn signature_for(&self, pending: &PendingTransfer) -> Result<String> {
        let wallet = self.store.get(&pending.from_address).await.map_err(|_| {
            Error::Signing(format!("no local wallet for {}", pending.from_address))
        })?;
        let mnemonic = wallet.mnemonic().ok_or_else(|| {
            Error::Signing(format!("wallet {} is view-only", pending.from_address))
        })?;

        let (_, signer) = KeyManager::derive(mnemonic).map_err(|_| {
            Error::Signing(format!(
                "stored mnemonic for {} is not usable",
                pending.from_address
            ))
        })?;
        if signer.address() != pending.from_address {
            return Err(Error::Signing(format!(
                "stored mnemonic does not belong to {}",
                pending.from_address
            )));
        }
        KeyManager::sign(&signer, &pending.message)
    }

    /// Submit the signature; sent exactly once
    ///
    /// On success the sender's balance (and the recipient's, if it is a local
    /// wallet) is refreshed from the ledger.
    pub async fn execute(&mut self, signature: &str) -> Result<TransferReceipt> {
        let pending = match std::mem::replace(&mut self.state, TransferState::Submitted) {
            TransferState::Signing(pending) => pending,
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(Error::Protocol(format!("cannot execute while {}", phase)));
            }
        };

        tracing::info!(
            attempt_id = %self.attempt_id,
            transfer_id = %pending.transfer_id,
            "Submitting transfer"
        );
        self.audit(
            AuditEntry::new(self.attempt_id, AuditEvent::Submitted)
                .with_pending(&pending)
                .with_signature(signature),
        )
        .await;

        let request = ExecuteTransferRequest {
            transfer_id: pending.transfer_id.clone(),
            signature: signature.to_string(),
        };
        let executed = match self.ledger.execute_transfer(&request).await {
            Ok(executed) => executed,
            Err(e) => {
                self.audit(
                    AuditEntry::new(self.attempt_id, AuditEvent::Failed)
                        .with_pending(&pending)
                        .with_error(&e),
                )
                .await;
                return Err(self.fail(e));
            }
        };

        let receipt = TransferReceipt {
            transfer_id: pending.transfer_id.to_string(),
            transaction_id: executed.transaction_id,
            from_address: pending.from_address.clone(),
            to_address: pending.to_address.clone(),
            amount: executed.amount.unwrap_or(pending.amount),
            amount_usd: executed.amount_usd.or(pending.amount_usd),
        };
        self.state = TransferState::Completed(receipt.clone());

        tracing::info!(
            attempt_id = %self.attempt_id,
            transfer_id = %receipt.transfer_id,
            transaction_id = ?receipt.transaction_id,
            amount = receipt.amount,
            "Transfer completed"
        );
        self.audit(
            AuditEntry::new(self.attempt_id, AuditEvent::Completed)
                .with_pending(&pending)
                .with_transaction_id(receipt.transaction_id.as_ref().map(id_text)),
        )
        .await;

        self.refresh_after_completion(&receipt).await;
        Ok(receipt)
    }

    async fn refresh_after_completion(&self, receipt: &TransferReceipt) {
        for address in [&receipt.from_address, &receipt.to_address] {
            if let Err(e) = self.sync.refresh(address).await {
                tracing::warn!(
                    address = %address,
                    error = %e,
                    "Balance refresh after transfer failed"
                );
            }
        }
    }

    /// Drop the pending transfer without contacting the ledger
    pub async fn cancel(&mut self) -> Result<()> {
        let pending = match std::mem::replace(&mut self.state, TransferState::Cancelled) {
            TransferState::Initiated(pending) | TransferState::Signing(pending) => pending,
            other => {
                let phase = other.phase();
                self.state = other;
                return Err(Error::Protocol(format!("nothing to cancel while {}", phase)));
            }
        };

        tracing::info!(
            attempt_id = %self.attempt_id,
            transfer_id = %pending.transfer_id,
            "Transfer cancelled"
        );
        self.audit(AuditEntry::new(self.attempt_id, AuditEvent::Cancelled).with_pending(&pending))
            .await;
        Ok(())
    }

    /// Return to `Idle` after a finished attempt
    pub fn reset(&mut self) -> Result<()> {
        if !self.state.is_terminal() && self.phase() != TransferPhase::Idle {
            return Err(Error::Protocol(format!(
                "cannot reset while {}",
                self.phase()
            )));
        }
        self.state = TransferState::Idle;
        self.attempt_id = Uuid::new_v4();
        Ok(())
    }

    /// Run initiate, sign and execute in one go
    pub async fn send(
        &mut self,
        from: &str,
        to: &str,
        amount: f64,
        amount_type: AmountType,
    ) -> Result<TransferReceipt> {
        self.initiate(from, to, amount, amount_type).await?;
        let signature = self.sign().await?;
        self.execute(&signature).await
    }

    fn fail(&mut self, error: Error) -> Error {
        tracing::warn!(
            attempt_id = %self.attempt_id,
            error = %error,
            "Transfer failed"
        );
        self.state = TransferState::Failed {
            reason: error.to_string(),
        };
        error
    }

    async fn audit(&self, entry: AuditEntry) {
        if let Some(audit) = &self.audit {
            audit.record(entry).await;
        }
    }
}

fn id_text(id: &Value) -> String {
    match id {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
