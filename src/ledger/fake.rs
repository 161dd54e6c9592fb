//! In-process ledger used by tests
//!
//! Mirrors the reference ledger closely enough to run the whole transfer
//! protocol: pending transfers with a lifetime, EIP-191 signature recovery on
//! execute, balance moves and a history list. Failures can be injected per call.

use super::types::{
    AmountType, CreatedWallet, ExecuteTransferRequest, ExecutedTransfer, HealthStatus,
    ImportedWallet, InitiateTransferRequest, InitiatedTransfer, Transaction, TransactionKind,
    TransactionStatus,
};
use super::LedgerService;
use crate::wallet::{normalize_address, KeyManager, Mnemonic};
use crate::{Error, Result};
use alloy::primitives::{hex, Signature};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde_json::json;
use std::collections::HashMap;
use tokio::sync::Mutex;

/// Phrases handed out by `create_wallet`, in order
pub(crate) const FAKE_MNEMONICS: [&str; 4] = [
    "test test test test test test test test test test test junk",
    "legal winner thank year wave sausage worth useful legal winner thank yellow",
    "letter advice cage absurd amount doctor acoustic avoid letter advice cage above",
    "zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo zoo wrong",
];

const USD_PER_ETH: f64 = 2000.0;

struct PendingRecord {
    from: String,
    to: String,
    amount: f64,
    amount_usd: Option<f64>,
    message: String,
    expires_at: DateTime<Utc>,
}

struct StoredTransaction {
    id: u64,
    from: String,
    to: String,
    amount: f64,
    amount_usd: Option<f64>,
    created_at: DateTime<Utc>,
}

struct FakeState {
    balances: Vec<(String, f64)>,
    pending: HashMap<u64, PendingRecord>,
    transactions: Vec<StoredTransaction>,
    next_id: u64,
    next_mnemonic: usize,
    create_balance: f64,
    transfer_ttl: Duration,
    calls: HashMap<&'static str, usize>,
    network_failures: HashMap<&'static str, usize>,
    execute_rejection: Option<String>,
    lose_execute_response: bool,
}

impl FakeState {
    /// Count the call and apply any injected transport failure
    fn enter(&mut self, operation: &'static str) -> Result<()> {
        *self.calls.entry(operation).or_default() += 1;
        if let Some(remaining) = self.network_failures.get_mut(operation) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(Error::Network(format!("{}: connection reset", operation)));
            }
        }
        Ok(())
    }

    fn balance_mut(&mut self, address: &str) -> Option<&mut f64> {
        self.balances
            .iter_mut()
            .find(|(a, _)| a == address)
            .map(|(_, b)| b)
    }

    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

pub(crate) struct FakeLedger {
    state: Mutex<FakeState>,
}

impl FakeLedger {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(FakeState {
                balances: Vec::new(),
                pending: HashMap::new(),
                transactions: Vec::new(),
                next_id: 0,
                next_mnemonic: 0,
                create_balance: 5.0,
                transfer_ttl: Duration::seconds(30),
                calls: HashMap::new(),
                network_failures: HashMap::new(),
                execute_rejection: None,
                lose_execute_response: false,
            }),
        }
    }

    pub async fn seed_wallet(&self, address: &str, balance: f64) {
        let mut state = self.state.lock().await;
        let address = normalize_address(address);
        match state.balance_mut(&address) {
            Some(b) => *b = balance,
            None => state.balances.push((address, balance)),
        }
    }

    pub async fn seed_transaction(&self, from: &str, to: &str, amount: f64) {
        let mut state = self.state.lock().await;
        let id = state.next_id();
        state.transactions.push(StoredTransaction {
            id,
            from: normalize_address(from),
            to: normalize_address(to),
            amount,
            amount_usd: None,
            created_at: Utc::now(),
        });
    }

    pub async fn set_create_balance(&self, balance: f64) {
        self.state.lock().await.create_balance = balance;
    }

    pub async fn set_transfer_ttl(&self, ttl: Duration) {
        self.state.lock().await.transfer_ttl = ttl;
    }

    /// Make the next call of `operation` fail at the transport level
    pub async fn fail_next(&self, operation: &'static str) {
        *self
            .state
            .lock()
            .await
            .network_failures
            .entry(operation)
            .or_default() += 1;
    }

    /// Decline the next execute with `message`
    pub async fn reject_execute(&self, message: &str) {
        self.state.lock().await.execute_rejection = Some(message.to_string());
    }

    /// Apply the next execute but report a transport failure to the caller
    pub async fn lose_execute_response(&self) {
        self.state.lock().await.lose_execute_response = true;
    }

    pub async fn calls(&self, operation: &str) -> usize {
        self.state
            .lock()
            .await
            .calls
            .get(operation)
            .copied()
            .unwrap_or(0)
    }

    pub async fn ledger_balance(&self, address: &str) -> Option<f64> {
        let address = normalize_address(address);
        self.state
            .lock()
            .await
            .balances
            .iter()
            .find(|(a, _)| *a == address)
            .map(|(_, b)| *b)
    }

    pub async fn pending_count(&self) -> usize {
        self.state.lock().await.pending.len()
    }
}

fn signer_of(signature_hex: &str, message: &str) -> Option<String> {
    let bytes = hex::decode(signature_hex).ok()?;
    let signature = Signature::try_from(bytes.as_slice()).ok()?;
    let address = signature.recover_address_from_msg(message.as_bytes()).ok()?;
    Some(normalize_address(&address.to_string()))
}

#[async_trait]
impl LedgerService for FakeLedger {
    async fn create_wallet(&self) -> Result<CreatedWallet> {
        let mut state = self.state.lock().await;
        state.enter("create_wallet")?;

        let phrase = FAKE_MNEMONICS[state.next_mnemonic % FAKE_MNEMONICS.len()];
        state.next_mnemonic += 1;
        let mnemonic = Mnemonic::new(phrase);
        let address = KeyManager::address_of(&mnemonic)?;
        let balance = state.create_balance;
        if state.balance_mut(&address).is_none() {
            state.balances.push((address.clone(), balance));
        }

        Ok(CreatedWallet {
            address,
            mnemonic,
            balance,
        })
    }

    async fn import_wallet(&self, mnemonic: &Mnemonic) -> Result<ImportedWallet> {
        let mut state = self.state.lock().await;
        state.enter("import_wallet")?;

        let address = KeyManager::address_of(mnemonic)
            .map_err(|_| Error::Service("Invalid mnemonic phrase".into()))?;
        let balance = match state.balance_mut(&address) {
            Some(b) => *b,
            None => {
                let b = state.create_balance;
                state.balances.push((address.clone(), b));
                b
            }
        };
        Ok(ImportedWallet { address, balance })
    }

    async fn balance(&self, address: &str) -> Result<f64> {
        let mut state = self.state.lock().await;
        state.enter("balance")?;
        state
            .balance_mut(&normalize_address(address))
            .map(|b| *b)
            .ok_or_else(|| Error::Service("Wallet not found".into()))
    }

    async fn initiate_transfer(
        &self,
        request: &InitiateTransferRequest,
    ) -> Result<InitiatedTransfer> {
        let mut state = self.state.lock().await;
        state.enter("initiate_transfer")?;

        let from = normalize_address(&request.from_address);
        let to = normalize_address(&request.to_address);
        let sender_balance = *state
            .balance_mut(&from)
            .ok_or_else(|| Error::Service("Sender wallet not found".into()))?;

        let (amount, amount_usd) = match request.amount_type {
            AmountType::Eth => (request.amount, None),
            AmountType::Usd => (request.amount / USD_PER_ETH, Some(request.amount)),
        };
        if amount_usd.is_some() && sender_balance < amount {
            return Err(Error::Service("Insufficient balance".into()));
        }

        let now = Utc::now();
        let message = match amount_usd {
            Some(usd) => format!(
                "Transfer {:.6} ETH (${:.2} USD) to {} from {} at {}",
                amount,
                usd,
                to,
                from,
                now.timestamp()
            ),
            None => format!(
                "Transfer {:.6} ETH to {} from {} at {}",
                amount,
                to,
                from,
                now.timestamp()
            ),
        };
        let expires_at = now + state.transfer_ttl;

        let id = state.next_id();
        state.pending.insert(
            id,
            PendingRecord {
                from: from.clone(),
                to: to.clone(),
                amount,
                amount_usd,
                message: message.clone(),
                expires_at,
            },
        );

        let response = json!({
            "success": true,
            "message": message,
            "transfer_id": id,
            "from_address": from,
            "to_address": to,
            "amount": amount,
            "amount_usd": amount_usd,
            "expires_at": expires_at.to_rfc3339(),
        });
        Ok(serde_json::from_value(response)?)
    }

    async fn execute_transfer(
        &self,
        request: &ExecuteTransferRequest,
    ) -> Result<ExecutedTransfer> {
        let mut guard = self.state.lock().await;
        let state = &mut *guard;
        state.enter("execute_transfer")?;

        let id = request
            .transfer_id
            .as_u64()
            .ok_or_else(|| Error::Service("Transfer not found or expired".into()))?;
        let (expired, signed_by_sender) = match state.pending.get(&id) {
            Some(pending) => (
                Utc::now() > pending.expires_at,
                signer_of(&request.signature, &pending.message).as_deref()
                    == Some(pending.from.as_str()),
            ),
            None => return Err(Error::Service("Transfer not found or expired".into())),
        };

        if expired {
            state.pending.remove(&id);
            return Err(Error::Service("Transfer expired".into()));
        }
        if let Some(reason) = state.execute_rejection.take() {
            state.pending.remove(&id);
            return Err(Error::Service(reason));
        }
        // The reference ledger keeps the pending transfer after a bad signature.
        if !signed_by_sender {
            return Err(Error::Service("Invalid signature".into()));
        }

        let Some(pending) = state.pending.remove(&id) else {
            return Err(Error::Service("Transfer not found or expired".into()));
        };
        let sender = state
            .balance_mut(&pending.from)
            .ok_or_else(|| Error::Service("Sender wallet not found".into()))?;
        if *sender < pending.amount {
            return Err(Error::Service("Insufficient balance".into()));
        }
        *sender -= pending.amount;
        match state.balance_mut(&pending.to) {
            Some(b) => *b += pending.amount,
            None => state.balances.push((pending.to.clone(), pending.amount)),
        }

        let tx_id = state.next_id();
        state.transactions.push(StoredTransaction {
            id: tx_id,
            from: pending.from,
            to: pending.to,
            amount: pending.amount,
            amount_usd: pending.amount_usd,
            created_at: Utc::now(),
        });

        if std::mem::take(&mut state.lose_execute_response) {
            return Err(Error::Network("connection reset before response".into()));
        }

        Ok(ExecutedTransfer {
            transaction_id: Some(json!(tx_id)),
            amount: Some(pending.amount),
            amount_usd: pending.amount_usd,
            message: Some("Transfer completed successfully".into()),
        })
    }

    async fn history(&self, address: &str) -> Result<Vec<Transaction>> {
        let mut state = self.state.lock().await;
        state.enter("history")?;

        let address = normalize_address(address);
        Ok(state
            .transactions
            .iter()
            .rev()
            .filter(|tx| tx.from == address || tx.to == address)
            .map(|tx| Transaction {
                id: tx.id,
                kind: if tx.from == address {
                    TransactionKind::Sent
                } else {
                    TransactionKind::Received
                },
                amount: tx.amount,
                amount_usd: tx.amount_usd,
                to_address: tx.to.clone(),
                from_address: tx.from.clone(),
                status: TransactionStatus::Completed,
                created_at: tx.created_at.to_rfc3339(),
            })
            .collect())
    }

    async fn health(&self) -> Result<HealthStatus> {
        let mut state = self.state.lock().await;
        state.enter("health")?;
        Ok(HealthStatus {
            status: "healthy".into(),
            timestamp: Some(Utc::now().to_rfc3339()),
        })
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}
