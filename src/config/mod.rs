//! Configuration for the wallet manager

pub mod ledger;

use crate::wallet::DEFAULT_COLLECTION_KEY;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub use ledger::LedgerConfig;

/// Environment variable names
mod env_vars {
    pub const WALLET_DATA_DIR: &str = "WALLET_DATA_DIR";
    pub const WALLET_AUDIT_LOG: &str = "WALLET_AUDIT_LOG";
}

/// Where wallet records are kept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Directory holding `<collection_key>.json`
    pub data_dir: PathBuf,
    /// Record name of the wallet collection
    pub collection_key: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./wallet-data"),
            collection_key: DEFAULT_COLLECTION_KEY.to_string(),
        }
    }
}

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub ledger: LedgerConfig,
    pub storage: StorageConfig,
    /// Path to the transfer audit log (JSONL); defaults to `audit.jsonl` in the data dir
    pub audit_log_path: Option<PathBuf>,
}

impl Config {
    /// Load from an optional JSON file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        serde_json::from_str(&content)
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }

    pub fn apply_env(&mut self) -> Result<()> {
        self.ledger.apply_env()?;
        if let Ok(dir) = std::env::var(env_vars::WALLET_DATA_DIR) {
            self.storage.data_dir = PathBuf::from(dir);
        }
        if let Ok(path) = std::env::var(env_vars::WALLET_AUDIT_LOG) {
            self.audit_log_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    /// Effective audit log location
    pub fn audit_log(&self) -> PathBuf {
        self.audit_log_path
            .clone()
            .unwrap_or_else(|| self.storage.data_dir.join("audit.jsonl"))
    }
}
