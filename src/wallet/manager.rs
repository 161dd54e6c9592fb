//! Wallet lifecycle: creation, import, selection, renaming and deletion

use super::keys::{normalize_address, KeyManager, Mnemonic};
use super::model::{Wallet, WalletDraft};
use super::store::WalletStore;
use crate::ledger::LedgerService;
use crate::{Error, Result};
use std::sync::Arc;

/// Ties the local wallet collection to the ledger that mints and funds wallets
pub struct WalletManager {
    ledger: Arc<dyn LedgerService>,
    store: WalletStore,
}

impl WalletManager {
    pub fn new(ledger: Arc<dyn LedgerService>, store: WalletStore) -> Self {
        Self { ledger, store }
    }

    pub fn store(&self) -> &WalletStore {
        &self.store
    }

    /// Ask the ledger for a fresh wallet and keep it with its phrase
    ///
    /// The returned phrase is derived locally; a ledger whose address does not
    /// match its own phrase is rejected before anything is stored.
    pub async fn create_wallet(&self, name: Option<String>) -> Result<Wallet> {
        let created = self.ledger.create_wallet().await?;
        let address = normalize_address(&created.address);

        let derived = KeyManager::address_of(&created.mnemonic).map_err(|_| {
            Error::Service("ledger returned a mnemonic that does not derive a wallet".into())
        })?;
        if derived != address {
            return Err(Error::Service(format!(
                "ledger returned address {} but its mnemonic derives {}",
                address, derived
            )));
        }

        let mut draft = WalletDraft::new(&address, created.balance).with_mnemonic(created.mnemonic);
        draft.name = name;
        let wallet = self.store.upsert(draft).await?;

        tracing::info!(
            address = %wallet.address(),
            name = %wallet.name(),
            balance = wallet.balance(),
            ledger = self.ledger.name(),
            "Created wallet"
        );
        Ok(wallet)
    }

    /// Register an existing phrase with the ledger and keep it locally
    ///
    /// The phrase is checked before any network call. Re-importing a known
    /// wallet keeps its name unless a new one is given.
    pub async fn import_wallet(&self, phrase: &str, name: Option<String>) -> Result<Wallet> {
        let mnemonic = Mnemonic::new(phrase);
        let derived = KeyManager::address_of(&mnemonic)?;

        let imported = self.ledger.import_wallet(&mnemonic).await?;
        let address = normalize_address(&imported.address);
        if address != derived {
            return Err(Error::Service(format!(
                "ledger imported {} but the mnemonic derives {}",
                address, derived
            )));
        }

        let mut draft = WalletDraft::new(&address, imported.balance).with_mnemonic(mnemonic);
        draft.name = name;
        let wallet = self.store.upsert(draft).await?;

        tracing::info!(
            address = %wallet.address(),
            name = %wallet.name(),
            balance = wallet.balance(),
            "Imported wallet"
        );
        Ok(wallet)
    }

    /// Look up a wallet; the result says whether it can sign
    pub async fn select(&self, address: &str) -> Result<Wallet> {
        let wallet = self.store.get(address).await?;
        tracing::debug!(
            address = %wallet.address(),
            view_only = wallet.is_view_only(),
            "Selected wallet"
        );
        Ok(wallet)
    }

    pub async fn rename(&self, address: &str, name: &str) -> Result<Wallet> {
        self.store.rename(address, name).await
    }

    /// Forget a wallet locally; the ledger keeps its balance
    pub async fn delete(&self, address: &str) -> Result<bool> {
        self.store.remove(address).await
    }

    pub async fn list(&self) -> Vec<Wallet> {
        self.store.list().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::fake::{FakeLedger, FAKE_MNEMONICS};
    use crate::ledger::{
        CreatedWallet, ExecuteTransferRequest, ExecutedTransfer, HealthStatus, ImportedWallet,
        InitiateTransferRequest, InitiatedTransfer, Transaction,
    };
    use crate::wallet::backend::MemoryBackend;
    use crate::wallet::keys::tests::{OTHER_MNEMONIC, TEST_ADDRESS, TEST_MNEMONIC};
    use crate::wallet::DEFAULT_COLLECTION_KEY;
    use async_trait::async_trait;

    async fn manager_with(ledger: Arc<dyn LedgerService>) -> WalletManager {
        let store = WalletStore::open(Arc::new(MemoryBackend::new()), DEFAULT_COLLECTION_KEY).await;
        WalletManager::new(ledger, store)
    }

    #[tokio::test]
    async fn created_wallets_get_default_names_in_order() {
        let manager = manager_with(Arc::new(FakeLedger::new())).await;

        let first = manager.create_wallet(None).await.unwrap();
        let second = manager.create_wallet(Some("Savings".into())).await.unwrap();
        let third = manager.create_wallet(None).await.unwrap();

        assert_eq!(first.address(), TEST_ADDRESS);
        assert_eq!(first.name(), "Wallet 1");
        assert_eq!(first.balance(), 5.0);
        assert!(!first.is_view_only());
        assert_eq!(second.name(), "Savings");
        assert_eq!(third.name(), "Wallet 3");
        assert_eq!(manager.list().await.len(), 3);
    }

    #[tokio::test]
    async fn created_wallet_takes_ledger_balance() {
        let ledger = Arc::new(FakeLedger::new());
        ledger.set_create_balance(12.5).await;
        let manager = manager_with(ledger.clone()).await;

        let wallet = manager.create_wallet(None).await.unwrap();

        assert_eq!(wallet.balance(), 12.5);
        assert_eq!(ledger.ledger_balance(wallet.address()).await, Some(12.5));
        assert_eq!(ledger.calls("create_wallet").await, 1);
    }

    #[tokio::test]
    async fn invalid_phrase_never_reaches_ledger() {
        let ledger = Arc::new(FakeLedger::new());
        let manager = manager_with(ledger.clone()).await;

        let err = manager
            .import_wallet("not a real phrase at all", None)
            .await
            .unwrap_err();

        assert!(matches!(err, Error::InvalidMnemonic(_)));
        assert_eq!(ledger.calls("import_wallet").await, 0);
        assert!(manager.list().await.is_empty());
    }

    #[tokio::test]
    async fn reimport_keeps_name_and_picks_up_ledger_balance() {
        let ledger = Arc::new(FakeLedger::new());
        let manager = manager_with(ledger.clone()).await;

        manager
            .import_wallet(TEST_MNEMONIC, Some("Main".into()))
            .await
            .unwrap();
        ledger.seed_wallet(TEST_ADDRESS, 7.25).await;

        let again = manager.import_wallet(TEST_MNEMONIC, None).await.unwrap();

        assert_eq!(again.name(), "Main");
        assert_eq!(again.balance(), 7.25);
        assert_eq!(manager.list().await.len(), 1);
    }

    #[tokio::test]
    async fn import_attaches_secret_to_view_only_record() {
        let manager = manager_with(Arc::new(FakeLedger::new())).await;
        manager
            .store()
            .upsert(WalletDraft::new(TEST_ADDRESS, 1.0))
            .await
            .unwrap();
        assert!(manager.select(TEST_ADDRESS).await.unwrap().is_view_only());

        manager.import_wallet(TEST_MNEMONIC, None).await.unwrap();

        let selected = manager.select(&TEST_ADDRESS.to_uppercase().replace("0X", "0x")).await;
        assert!(!selected.unwrap().is_view_only());
    }

    #[tokio::test]
    async fn rename_and_delete() {
        let manager = manager_with(Arc::new(FakeLedger::new())).await;
        let wallet = manager.create_wallet(None).await.unwrap();

        assert!(matches!(
            manager.rename(wallet.address(), "   ").await,
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            manager.rename("0xdead", "Other").await,
            Err(Error::NotFound(_))
        ));

        let renamed = manager.rename(wallet.address(), "  Daily  ").await.unwrap();
        assert_eq!(renamed.name(), "Daily");

        assert!(manager.delete(wallet.address()).await.unwrap());
        assert!(!manager.delete(wallet.address()).await.unwrap());
        assert!(matches!(
            manager.select(wallet.address()).await,
            Err(Error::NotFound(_))
        ));
    }

    /// Hands out a phrase that belongs to a different address
    struct MismatchedLedger(FakeLedger);

    #[async_trait]
    impl LedgerService for MismatchedLedger {
        async fn create_wallet(&self) -> Result<CreatedWallet> {
            Ok(CreatedWallet {
                address: TEST_ADDRESS.into(),
                mnemonic: Mnemonic::new(OTHER_MNEMONIC),
                balance: 5.0,
            })
        }
        async fn import_wallet(&self, _mnemonic: &Mnemonic) -> Result<ImportedWallet> {
            self.0.import_wallet(&Mnemonic::new(FAKE_MNEMONICS[1])).await
        }
        async fn balance(&self, address: &str) -> Result<f64> {
            self.0.balance(address).await
        }
        async fn initiate_transfer(
            &self,
            request: &InitiateTransferRequest,
        ) -> Result<InitiatedTransfer> {
            self.0.initiate_transfer(request).await
        }
        async fn execute_transfer(
            &self,
            request: &ExecuteTransferRequest,
        ) -> Result<ExecutedTransfer> {
            self.0.execute_transfer(request).await
        }
        async fn history(&self, address: &str) -> Result<Vec<Transaction>> {
            self.0.history(address).await
        }
        async fn health(&self) -> Result<HealthStatus> {
            self.0.health().await
        }
        fn name(&self) -> &'static str {
            "mismatched"
        }
    }

    #[tokio::test]
    async fn ledger_address_must_match_phrase() {
        let manager = manager_with(Arc::new(MismatchedLedger(FakeLedger::new()))).await;

        let created = manager.create_wallet(None).await.unwrap_err();
        let imported = manager.import_wallet(TEST_MNEMONIC, None).await.unwrap_err();

        assert!(matches!(created, Error::Service(_)));
        assert!(matches!(imported, Error::Service(_)));
        assert!(manager.list().await.is_empty());
    }
}
