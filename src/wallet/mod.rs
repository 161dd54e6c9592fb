//! Wallet identities and their local persistence
//!
//! Mnemonics stay inside this module: they are held as `SecretString`, never
//! logged, and only written to the wallet collection record.

mod backend;
pub(crate) mod keys;
mod manager;
mod model;
mod store;

pub use backend::{FileBackend, KeyValueStore, MemoryBackend};
pub use keys::{normalize_address, KeyManager, Mnemonic, WalletSigner};
pub use manager::WalletManager;
pub use model::{default_name, format_balance, short_address, Wallet, WalletDraft, WalletInfo};
pub use store::{WalletStore, DEFAULT_COLLECTION_KEY};
