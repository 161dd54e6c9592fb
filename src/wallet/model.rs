//! Wallet records

use super::keys::{normalize_address, Mnemonic};
use serde::{Deserialize, Serialize};

/// Display fields of a wallet (safe to show and log)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WalletInfo {
    /// Lowercase `0x`-prefixed address
    pub address: String,
    pub name: String,
    /// Cached mirror of the ledger balance (ETH)
    pub balance: f64,
}

/// A stored wallet, resolved at lookup time to whether its secret is attached
#[derive(Debug, Clone)]
pub enum Wallet {
    WithSecret { info: WalletInfo, mnemonic: Mnemonic },
    ViewOnly(WalletInfo),
}

impl Wallet {
    pub fn info(&self) -> &WalletInfo {
        match self {
            Wallet::WithSecret { info, .. } => info,
            Wallet::ViewOnly(info) => info,
        }
    }

    fn info_mut(&mut self) -> &mut WalletInfo {
        match self {
            Wallet::WithSecret { info, .. } => info,
            Wallet::ViewOnly(info) => info,
        }
    }

    pub fn address(&self) -> &str {
        &self.info().address
    }

    pub fn name(&self) -> &str {
        &self.info().name
    }

    pub fn balance(&self) -> f64 {
        self.info().balance
    }

    pub fn mnemonic(&self) -> Option<&Mnemonic> {
        match self {
            Wallet::WithSecret { mnemonic, .. } => Some(mnemonic),
            Wallet::ViewOnly(_) => None,
        }
    }

    pub fn is_view_only(&self) -> bool {
        matches!(self, Wallet::ViewOnly(_))
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.info_mut().name = name;
    }

    pub(crate) fn set_balance(&mut self, balance: f64) {
        self.info_mut().balance = balance;
    }

    /// Drop the attached secret, keeping the display fields
    pub(crate) fn into_view_only(self) -> Wallet {
        match self {
            Wallet::WithSecret { info, .. } => Wallet::ViewOnly(info),
            view_only => view_only,
        }
    }

    /// Merge an incoming record into this one
    ///
    /// Display fields are replaced. A secret is attached when the incoming record
    /// carries one and is never removed when it does not.
    pub(crate) fn merge(self, draft: WalletDraft) -> Wallet {
        let (mut info, existing_secret) = match self {
            Wallet::WithSecret { info, mnemonic } => (info, Some(mnemonic)),
            Wallet::ViewOnly(info) => (info, None),
        };

        if let Some(name) = draft.name {
            info.name = name;
        }
        info.balance = draft.balance;

        match draft.mnemonic.or(existing_secret) {
            Some(mnemonic) => Wallet::WithSecret { info, mnemonic },
            None => Wallet::ViewOnly(info),
        }
    }
}

/// An incoming wallet record for `WalletStore::upsert`
///
/// `name: None` keeps the stored name (or synthesizes `Wallet N` for a new record);
/// `mnemonic: None` keeps any stored secret.
#[derive(Debug, Clone)]
pub struct WalletDraft {
    pub address: String,
    pub name: Option<String>,
    pub balance: f64,
    pub mnemonic: Option<Mnemonic>,
}

impl WalletDraft {
    pub fn new(address: &str, balance: f64) -> Self {
        Self {
            address: normalize_address(address),
            name: None,
            balance,
            mnemonic: None,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_mnemonic(mut self, mnemonic: Mnemonic) -> Self {
        self.mnemonic = Some(mnemonic);
        self
    }

    /// Build a brand-new record at 0-based `position` in the collection
    pub(crate) fn into_wallet(self, position: usize) -> Wallet {
        let info = WalletInfo {
            address: normalize_address(&self.address),
            name: self.name.unwrap_or_else(|| default_name(position)),
            balance: self.balance,
        };
        match self.mnemonic {
            Some(mnemonic) => Wallet::WithSecret { info, mnemonic },
            None => Wallet::ViewOnly(info),
        }
    }
}

/// `Wallet N` label for the 0-based `position`
pub fn default_name(position: usize) -> String {
    format!("Wallet {}", position + 1)
}

/// On-disk shape of one wallet
///
/// Older snapshots may lack `name` (and the client never wrote anything but the
/// address for view-only wallets), so every field but `address` is optional.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct PersistedWallet {
    pub address: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mnemonic: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    pub balance: f64,
}

impl PersistedWallet {
    pub fn from_wallet(wallet: &Wallet) -> Self {
        Self {
            address: wallet.address().to_string(),
            mnemonic: wallet.mnemonic().map(|m| m.expose().to_string()),
            name: Some(wallet.name().to_string()),
            balance: wallet.balance(),
        }
    }

    pub fn into_wallet(self, position: usize) -> Wallet {
        WalletDraft {
            address: self.address,
            name: self.name.filter(|n| !n.trim().is_empty()),
            balance: self.balance,
            mnemonic: self.mnemonic.map(Mnemonic::new),
        }
        .into_wallet(position)
    }
}

/// Render a balance with 6 fractional digits
pub fn format_balance(balance: f64) -> String {
    format!("{:.6}", balance)
}

/// Abbreviate an address as `0x1234...abcd`
pub fn short_address(address: &str) -> String {
    if address.len() <= 10 || !address.is_ascii() {
        return address.to_string();
    }
    format!("{}...{}", &address[..6], &address[address.len() - 4..])
}
