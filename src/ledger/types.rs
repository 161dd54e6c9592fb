//! Request and response shapes of the remote ledger

use crate::wallet::Mnemonic;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Unit the transfer amount is expressed in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum AmountType {
    #[default]
    #[serde(rename = "ETH")]
    Eth,
    /// Converted to ETH by the ledger at initiate time
    #[serde(rename = "USD")]
    Usd,
}

impl AmountType {
    pub fn name(&self) -> &'static str {
        match self {
            AmountType::Eth => "ETH",
            AmountType::Usd => "USD",
        }
    }
}

impl fmt::Display for AmountType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AmountType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ETH" => Ok(AmountType::Eth),
            "USD" => Ok(AmountType::Usd),
            _ => Err(format!("Unknown amount type: {}. Use 'ETH' or 'USD'", s)),
        }
    }
}

/// Opaque token issued by the ledger for one initiate call
///
/// Echoed back to the ledger exactly as received (number or string).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TransferId(Value);

impl From<u64> for TransferId {
    fn from(id: u64) -> Self {
        Self(Value::from(id))
    }
}

impl From<&str> for TransferId {
    fn from(id: &str) -> Self {
        Self(Value::from(id))
    }
}

impl TransferId {
    pub fn as_u64(&self) -> Option<u64> {
        match &self.0 {
            Value::Number(n) => n.as_u64(),
            Value::String(s) => s.parse().ok(),
            _ => None,
        }
    }
}

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// Wallet minted by the ledger
#[derive(Debug, Clone)]
pub struct CreatedWallet {
    pub address: String,
    pub mnemonic: Mnemonic,
    pub balance: f64,
}

/// Ledger-side view of an imported wallet
#[derive(Debug, Clone, Deserialize)]
pub struct ImportedWallet {
    pub address: String,
    pub balance: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InitiateTransferRequest {
    pub from_address: String,
    pub to_address: String,
    pub amount: f64,
    pub amount_type: AmountType,
}

/// Terms issued by the ledger for a transfer
#[derive(Debug, Clone, Deserialize)]
pub struct InitiatedTransfer {
    pub transfer_id: TransferId,
    /// Exact text the sender must sign
    pub message: String,
    #[serde(default)]
    pub from_address: Option<String>,
    pub to_address: String,
    /// ETH amount after any USD conversion
    pub amount: f64,
    #[serde(default)]
    pub amount_usd: Option<f64>,
    #[serde(default, deserialize_with = "deserialize_timestamp")]
    pub expires_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecuteTransferRequest {
    pub transfer_id: TransferId,
    pub signature: String,
}

/// Ledger acknowledgement of an executed transfer
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExecutedTransfer {
    #[serde(default)]
    pub transaction_id: Option<Value>,
    #[serde(default)]
    pub amount: Option<f64>,
    #[serde(default)]
    pub amount_usd: Option<f64>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
    Sent,
    Received,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
    Pending,
    Completed,
    #[serde(other)]
    Unknown,
}

/// One entry of a wallet's transaction history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: f64,
    #[serde(default)]
    pub amount_usd: Option<f64>,
    pub to_address: String,
    pub from_address: String,
    pub status: TransactionStatus,
    /// Timestamp as sent by the ledger
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub timestamp: Option<String>,
}

/// Parse an ISO-8601 timestamp; zone-less values are taken as UTC
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

/// Lenient: an unparsable timestamp becomes `None`
fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_timestamp))
}
