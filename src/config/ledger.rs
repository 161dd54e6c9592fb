//! Remote ledger endpoint configuration
//!
//! Values come from the config file and can be overridden per variable:
//!
//! ```bash
//! export LEDGER_URL="http://localhost:5001"
//! export LEDGER_TIMEOUT_SECS=10
//! export LEDGER_READ_RETRIES=2
//! ```

use crate::ledger::RetryPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

/// Environment variable names
pub(crate) mod env_vars {
    pub const LEDGER_URL: &str = "LEDGER_URL";
    pub const LEDGER_TIMEOUT_SECS: &str = "LEDGER_TIMEOUT_SECS";
    pub const LEDGER_READ_RETRIES: &str = "LEDGER_READ_RETRIES";
}

pub const DEFAULT_LEDGER_URL: &str = "http://localhost:5001";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LedgerConfig {
    /// Base URL of the ledger service (without `/api`)
    pub base_url: String,
    /// Per-request timeout
    pub timeout_secs: u64,
    /// Extra attempts for idempotent calls after a transport failure
    pub read_retries: u32,
    /// Linear backoff step between retries
    pub retry_backoff_ms: u64,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_LEDGER_URL.to_string(),
            timeout_secs: 10,
            read_retries: 2,
            retry_backoff_ms: 250,
        }
    }
}

impl LedgerConfig {
    /// Override fields whose environment variable is set
    pub fn apply_env(&mut self) -> Result<()> {
        if let Ok(url) = std::env::var(env_vars::LEDGER_URL) {
            tracing::debug!("Using LEDGER_URL for the ledger endpoint");
            self.base_url = url;
        }
        if let Some(secs) = parse_env(env_vars::LEDGER_TIMEOUT_SECS)? {
            self.timeout_secs = secs;
        }
        if let Some(retries) = parse_env(env_vars::LEDGER_READ_RETRIES)? {
            self.read_retries = retries;
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Parsed base URL, with a trailing slash so API paths join beneath it
    pub fn base_url(&self) -> Result<Url> {
        let trimmed = self.base_url.trim();
        let with_slash = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{}/", trimmed)
        };
        let url = Url::parse(&with_slash)
            .map_err(|e| Error::Config(format!("Invalid ledger URL {}: {}", self.base_url, e)))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(Error::Config(format!(
                "Unsupported ledger URL scheme: {}",
                url.scheme()
            )));
        }
        Ok(url)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_retries: self.read_retries,
            backoff: Duration::from_millis(self.retry_backoff_ms),
        }
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match std::env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| Error::Config(format!("{} must be a non-negative integer", name))),
        Err(_) => Ok(None),
    }
}
