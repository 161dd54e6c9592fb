//! Persisted wallet collection
//!
//! Holds every known wallet keyed by address, in insertion order, and writes the
//! whole collection back as a single record on each change.
//!
//! Writes are last-writer-wins: two processes sharing the same backend can lose
//! each other's updates.

use super::backend::KeyValueStore;
use super::keys::{normalize_address, KeyManager};
use super::model::{PersistedWallet, Wallet, WalletDraft};
use crate::{Error, Result};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Default record name for the wallet collection
pub const DEFAULT_COLLECTION_KEY: &str = "wallets";

/// Thread-safe wallet store backed by a key/value record
#[derive(Clone)]
pub struct WalletStore {
    backend: Arc<dyn KeyValueStore>,
    key: String,
    wallets: Arc<RwLock<Vec<Wallet>>>,
}

impl WalletStore {
    /// Open the store, loading the persisted collection
    ///
    /// Unreadable or malformed data is logged and the store starts empty; the
    /// stale record is replaced on the next write.
    pub async fn open(backend: Arc<dyn KeyValueStore>, key: impl Into<String>) -> Self {
        let key = key.into();
        let wallets = match Self::load_snapshot(backend.as_ref(), &key).await {
            Ok(wallets) => wallets,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Resetting wallet store to empty");
                Vec::new()
            }
        };

        tracing::debug!(key = %key, count = wallets.len(), "Opened wallet store");

        Self {
            backend,
            key,
            wallets: Arc::new(RwLock::new(wallets)),
        }
    }

    async fn load_snapshot(backend: &dyn KeyValueStore, key: &str) -> Result<Vec<Wallet>> {
        let content = backend
            .load(key)
            .await
            .map_err(|e| Error::PersistenceCorruption(format!("unreadable: {}", e)))?;

        match content {
            Some(content) if !content.trim().is_empty() => decode_snapshot(&content),
            _ => Ok(Vec::new()),
        }
    }

    /// All wallets in insertion order
    pub async fn list(&self) -> Vec<Wallet> {
        self.wallets.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.wallets.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.wallets.read().await.is_empty()
    }

    /// Look up a wallet by address (case-insensitive)
    pub async fn get(&self, address: &str) -> Result<Wallet> {
        let address = normalize_address(address);
        self.wallets
            .read()
            .await
            .iter()
            .find(|w| w.address() == address)
            .cloned()
            .ok_or(Error::NotFound(address))
    }

    /// Insert a wallet or merge it into the record with the same address
    ///
    /// Display fields are replaced; a stored mnemonic is kept when the draft
    /// carries none. A draft mnemonic must derive the draft address.
    pub async fn upsert(&self, draft: WalletDraft) -> Result<Wallet> {
        let draft = validate_draft(draft)?;

        let mut wallets = self.wallets.write().await;
        let mut updated = wallets.clone();

        let wallet = match updated.iter().position(|w| w.address() == draft.address) {
            Some(index) => {
                let merged = updated[index].clone().merge(draft);
                updated[index] = merged.clone();
                merged
            }
            None => {
                let wallet = draft.into_wallet(updated.len());
                updated.push(wallet.clone());
                wallet
            }
        };

        self.persist(&updated).await?;
        *wallets = updated;

        tracing::debug!(
            address = %wallet.address(),
            view_only = wallet.is_view_only(),
            "Upserted wallet"
        );
        Ok(wallet)
    }

    /// Change a wallet's display name
    pub async fn rename(&self, address: &str, name: &str) -> Result<Wallet> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::Validation("wallet name cannot be empty".into()));
        }
        let address = normalize_address(address);

        let mut wallets = self.wallets.write().await;
        let mut updated = wallets.clone();
        let wallet = updated
            .iter_mut()
            .find(|w| w.address() == address)
            .ok_or_else(|| Error::NotFound(address.clone()))?;
        wallet.set_name(name.to_string());
        let renamed = wallet.clone();

        self.persist(&updated).await?;
        *wallets = updated;
        Ok(renamed)
    }

    /// Store a fresh ledger balance for an existing wallet
    ///
    /// Never creates a record: an address that is not stored is `NotFound`.
    pub async fn update_balance(&self, address: &str, balance: f64) -> Result<Wallet> {
        if !balance.is_finite() || balance < 0.0 {
            return Err(Error::Validation(format!("invalid balance {}", balance)));
        }
        let address = normalize_address(address);

        let mut wallets = self.wallets.write().await;
        let mut updated = wallets.clone();
        let wallet = updated
            .iter_mut()
            .find(|w| w.address() == address)
            .ok_or_else(|| Error::NotFound(address.clone()))?;
        wallet.set_balance(balance);
        let refreshed = wallet.clone();

        self.persist(&updated).await?;
        *wallets = updated;
        Ok(refreshed)
    }

    /// Delete a wallet; returns whether a record was removed
    pub async fn remove(&self, address: &str) -> Result<bool> {
        let address = normalize_address(address);

        let mut wallets = self.wallets.write().await;
        if !wallets.iter().any(|w| w.address() == address) {
            return Ok(false);
        }
        let updated: Vec<Wallet> = wallets
            .iter()
            .filter(|w| w.address() != address)
            .cloned()
            .collect();

        self.persist(&updated).await?;
        *wallets = updated;

        tracing::info!(address = %address, "Removed wallet");
        Ok(true)
    }

    /// Write the full collection; the in-memory copy is only replaced after this succeeds
    async fn persist(&self, wallets: &[Wallet]) -> Result<()> {
        let snapshot: Vec<PersistedWallet> =
            wallets.iter().map(PersistedWallet::from_wallet).collect();
        let content = serde_json::to_string_pretty(&snapshot)?;
        self.backend.save_atomic(&self.key, &content).await
    }
}

fn validate_draft(mut draft: WalletDraft) -> Result<WalletDraft> {
    draft.address = normalize_address(&draft.address);
    if draft.address.is_empty() {
        return Err(Error::Validation("wallet address cannot be empty".into()));
    }
    if !draft.balance.is_finite() || draft.balance < 0.0 {
        return Err(Error::Validation(format!(
            "invalid balance {} for {}",
            draft.balance, draft.address
        )));
    }
    draft.name = draft
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());

    if let Some(mnemonic) = &draft.mnemonic {
        let derived = KeyManager::address_of(mnemonic)?;
        if derived != draft.address {
            return Err(Error::Validation(format!(
                "mnemonic derives {} but the record is for {}",
                derived, draft.address
            )));
        }
    }
    Ok(draft)
}

/// Decode a persisted collection, folding duplicate addresses into the first occurrence
///
/// A stored mnemonic that does not derive its record's address is dropped and
/// the wallet loads as view-only.
fn decode_snapshot(content: &str) -> Result<Vec<Wallet>> {
    let persisted: Vec<PersistedWallet> = serde_json::from_str(content)
        .map_err(|e| Error::PersistenceCorruption(format!("malformed: {}", e)))?;

    let mut wallets: Vec<Wallet> = Vec::with_capacity(persisted.len());
    for (position, record) in persisted.into_iter().enumerate() {
        let stored_name = record.name.clone().filter(|n| !n.trim().is_empty());
        let wallet = usable_secret(record.into_wallet(position));
        match wallets.iter().position(|w| w.address() == wallet.address()) {
            Some(index) => {
                tracing::warn!(address = %wallet.address(), "Duplicate wallet in snapshot");
                let draft = WalletDraft {
                    address: wallet.address().to_string(),
                    name: stored_name,
                    balance: wallet.balance(),
                    mnemonic: wallet.mnemonic().cloned(),
                };
                wallets[index] = wallets[index].clone().merge(draft);
            }
            None => wallets.push(wallet),
        }
    }
    Ok(wallets)
}

fn usable_secret(wallet: Wallet) -> Wallet {
    let Some(mnemonic) = wallet.mnemonic() else {
        return wallet;
    };
    match KeyManager::address_of(mnemonic) {
        Ok(derived) if derived == wallet.address() => wallet,
        _ => {
            tracing::warn!(
                address = %wallet.address(),
                "Stored mnemonic does not derive this wallet, loading it as view-only"
            );
            wallet.into_view_only()
        }
    }
}
