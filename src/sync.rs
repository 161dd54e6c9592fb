//! Balance refresh from the ledger into the local wallet store

use crate::ledger::LedgerService;
use crate::wallet::{normalize_address, WalletStore};
use crate::{Error, Result};
use std::sync::Arc;

pub struct BalanceSync {
    ledger: Arc<dyn LedgerService>,
    store: WalletStore,
}

impl BalanceSync {
    pub fn new(ledger: Arc<dyn LedgerService>, store: WalletStore) -> Self {
        Self { ledger, store }
    }

    /// Fetch the ledger balance of a local wallet and store it
    ///
    /// Returns `None` without calling the ledger when the address is not in the
    /// local store, and `None` when the wallet is removed while the balance is
    /// being fetched.
    pub async fn refresh(&self, address: &str) -> Result<Option<f64>> {
        let address = normalize_address(address);
        if self.store.get(&address).await.is_err() {
            tracing::debug!(address = %address, "Skipping refresh of unknown wallet");
            return Ok(None);
        }

        let balance = self.ledger.balance(&address).await?;
        let wallet = match self.store.update_balance(&address, balance).await {
            Ok(wallet) => wallet,
            Err(Error::NotFound(_)) => {
                tracing::debug!(address = %address, "Wallet removed during refresh");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };

        tracing::debug!(
            address = %wallet.address(),
            balance = wallet.balance(),
            "Refreshed balance"
        );
        Ok(Some(wallet.balance()))
    }
}
