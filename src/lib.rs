//! Ledger Wallet
//!
//! Client-side manager for wallets on a simulated value-transfer ledger:
//! - Mnemonic-derived keys with EIP-191 message signing
//! - A persisted multi-wallet collection keyed by address
//! - Signed two-phase transfers (initiate, sign, execute)
//! - Balance refresh and transaction history from the ledger
//!
//! # Security Model
//!
//! - Mnemonics are held as secrets and never logged or printed in `Debug` output
//! - The ledger only ever sees signatures, never keys
//! - Every transfer transition can be appended to a JSONL audit log

pub mod config;
pub mod ledger;
pub mod sync;
pub mod transfer;
pub mod wallet;

mod error;

// Re-export commonly used types
pub use config::{Config, LedgerConfig, StorageConfig};
pub use error::{Error, Result};
pub use ledger::{AmountType, HttpLedgerClient, LedgerService, TransactionLedgerClient};
pub use sync::BalanceSync;
pub use transfer::{TransferCoordinator, TransferPhase, TransferState};
pub use wallet::{Wallet, WalletManager, WalletStore};
