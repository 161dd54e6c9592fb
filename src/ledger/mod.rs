//! Remote ledger access
//!
//! The ledger owns balances, USD/ETH conversion and transaction storage. This
//! module defines a trait-based seam over its request/response contract so the
//! protocol code can run against the HTTP client or an in-process fake.

mod history;
mod http;
mod types;

#[cfg(test)]
pub(crate) mod fake;

pub use history::TransactionLedgerClient;
pub use http::{HttpLedgerClient, RetryPolicy};
pub use types::{
    parse_timestamp, AmountType, CreatedWallet, ExecuteTransferRequest, ExecutedTransfer,
    HealthStatus, ImportedWallet, InitiateTransferRequest, InitiatedTransfer, Transaction,
    TransactionKind, TransactionStatus, TransferId,
};

use crate::wallet::Mnemonic;
use crate::Result;
use async_trait::async_trait;

/// Calls exposed by the remote ledger
///
/// `balance`, `history`, `initiate_transfer` and `health` are idempotent.
/// `create_wallet` and `execute_transfer` change ledger state and must never be
/// retried automatically.
#[async_trait]
pub trait LedgerService: Send + Sync {
    /// Mint a new wallet; the ledger returns its phrase once
    async fn create_wallet(&self) -> Result<CreatedWallet>;

    /// Register an existing phrase with the ledger
    async fn import_wallet(&self, mnemonic: &Mnemonic) -> Result<ImportedWallet>;

    async fn balance(&self, address: &str) -> Result<f64>;

    /// Ask the ledger for transfer terms and the message to sign
    async fn initiate_transfer(
        &self,
        request: &InitiateTransferRequest,
    ) -> Result<InitiatedTransfer>;

    /// Submit the signature for a previously initiated transfer
    async fn execute_transfer(&self, request: &ExecuteTransferRequest)
        -> Result<ExecutedTransfer>;

    /// Transactions touching `address`, as ordered by the ledger
    async fn history(&self, address: &str) -> Result<Vec<Transaction>>;

    async fn health(&self) -> Result<HealthStatus>;

    /// Backend name for logging
    fn name(&self) -> &'static str;
}
