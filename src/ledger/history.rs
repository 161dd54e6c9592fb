//! Transaction history reads
//!
//! Read-only: the ledger's list is returned as-is, with no local caching.

use super::{LedgerService, Transaction};
use crate::wallet::normalize_address;
use crate::{Error, Result};
use std::sync::Arc;

pub struct TransactionLedgerClient {
    ledger: Arc<dyn LedgerService>,
}

impl TransactionLedgerClient {
    pub fn new(ledger: Arc<dyn LedgerService>) -> Self {
        Self { ledger }
    }

    /// Transactions touching `address`, in the order the ledger returns them
    pub async fn history(&self, address: &str) -> Result<Vec<Transaction>> {
        let address = normalize_address(address);
        if address.is_empty() {
            return Err(Error::Validation("missing address".into()));
        }

        let transactions = self.ledger.history(&address).await?;
        tracing::debug!(
            address = %address,
            count = transactions.len(),
            ledger = self.ledger.name(),
            "Fetched transaction history"
        );
        Ok(transactions)
    }
}
