//! HTTP client for the remote ledger
//!
//! Every response body is a JSON object carrying `success`; failures carry an
//! `error` message which is surfaced verbatim as `Error::Service`. Transport
//! problems (unreachable host, timeout, non-JSON body) become `Error::Network`.

use super::types::{
    CreatedWallet, ExecuteTransferRequest, ExecutedTransfer, HealthStatus, ImportedWallet,
    InitiateTransferRequest, InitiatedTransfer, Transaction,
};
use super::LedgerService;
use crate::config::LedgerConfig;
use crate::wallet::Mnemonic;
use crate::{Error, Result};
use alloy::primitives::Address;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::future::Future;
use std::str::FromStr;
use std::time::Duration;
use url::Url;

/// Retry budget for idempotent calls
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Extra attempts after the first failure
    pub max_retries: u32,
    /// Delay before retry `n` is `backoff * n`
    pub backoff: Duration,
}

#[derive(Deserialize)]
struct CreateWalletResponse {
    address: String,
    mnemonic: String,
    balance: f64,
}

#[derive(Deserialize)]
struct BalanceResponse {
    balance: f64,
}

#[derive(Deserialize)]
struct HistoryResponse {
    #[serde(default)]
    transactions: Vec<Transaction>,
}

#[derive(Serialize)]
struct WireInitiateRequest<'a> {
    from_address: String,
    to_address: String,
    amount: f64,
    amount_type: &'a str,
}

/// Ledger client over JSON/HTTP
pub struct HttpLedgerClient {
    client: Client,
    base_url: Url,
    retry: RetryPolicy,
}

impl HttpLedgerClient {
    pub fn new(config: &LedgerConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout())
            .build()
            .map_err(|e| Error::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url()?,
            retry: config.retry_policy(),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| Error::Config(format!("Invalid ledger path {}: {}", path, e)))
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!(url = %url, "GET");
        let response = self.client.get(url).send().await?;
        decode_response(response).await
    }

    async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let url = self.endpoint(path)?;
        tracing::debug!(url = %url, "POST");
        let response = self.client.post(url).json(body).send().await?;
        decode_response(response).await
    }
}

#[async_trait]
impl LedgerService for HttpLedgerClient {
    async fn create_wallet(&self) -> Result<CreatedWallet> {
        let created: CreateWalletResponse = self.post("api/wallet/create", &json!({})).await?;
        Ok(CreatedWallet {
            address: created.address,
            mnemonic: Mnemonic::new(created.mnemonic),
            balance: created.balance,
        })
    }

    async fn import_wallet(&self, mnemonic: &Mnemonic) -> Result<ImportedWallet> {
        self.post(
            "api/wallet/import",
            &json!({ "mnemonic": mnemonic.expose() }),
        )
        .await
    }

    async fn balance(&self, address: &str) -> Result<f64> {
        let path = format!("api/wallet/balance/{}", wire_address(address));
        let response: BalanceResponse =
            retry_idempotent(self.retry, "balance", || self.get(&path)).await?;
        Ok(response.balance)
    }

    async fn initiate_transfer(
        &self,
        request: &InitiateTransferRequest,
    ) -> Result<InitiatedTransfer> {
        let body = WireInitiateRequest {
            from_address: wire_address(&request.from_address),
            to_address: wire_address(&request.to_address),
            amount: request.amount,
            amount_type: request.amount_type.name(),
        };
        retry_idempotent(self.retry, "initiate_transfer", || {
            self.post("api/transfer/initiate", &body)
        })
        .await
    }

    async fn execute_transfer(
        &self,
        request: &ExecuteTransferRequest,
    ) -> Result<ExecutedTransfer> {
        // Sent exactly once: a lost response may hide a transfer that went through.
        self.post("api/transfer/execute", request).await
    }

    async fn history(&self, address: &str) -> Result<Vec<Transaction>> {
        let path = format!("api/transactions/{}", wire_address(address));
        let response: HistoryResponse =
            retry_idempotent(self.retry, "history", || self.get(&path)).await?;
        Ok(response.transactions)
    }

    async fn health(&self) -> Result<HealthStatus> {
        retry_idempotent(self.retry, "health", || self.get("api/health")).await
    }

    fn name(&self) -> &'static str {
        "http"
    }
}

/// The ledger keys wallets by their EIP-55 form; anything that is not a
/// 20-byte hex address is sent as given.
fn wire_address(address: &str) -> String {
    match Address::from_str(address.trim()) {
        Ok(parsed) => parsed.to_checksum(None),
        Err(_) => address.trim().to_string(),
    }
}

async fn decode_response<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let status = response.status();
    let body = response.text().await?;
    decode_body(status, &body)
}

fn decode_body<T: DeserializeOwned>(status: StatusCode, body: &str) -> Result<T> {
    let value: Value = serde_json::from_str(body).map_err(|_| {
        Error::Network(format!("unexpected response from ledger (HTTP {})", status))
    })?;

    let declined = value.get("success").and_then(Value::as_bool) == Some(false);
    if declined || !status.is_success() {
        let message = value
            .get("error")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| format!("request failed with HTTP {}", status));
        return Err(Error::Service(message));
    }

    serde_json::from_value(value)
        .map_err(|e| Error::Network(format!("malformed ledger response: {}", e)))
}

/// Linear backoff, capped at `Duration::MAX`
fn backoff_delay(policy: &RetryPolicy, attempt: u32) -> Duration {
    policy.backoff.saturating_mul(attempt)
}

/// Run an idempotent call, retrying transport failures within `policy`
async fn retry_idempotent<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut call: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0u32;
    loop {
        match call().await {
            Err(e) if e.is_retryable() && attempt < policy.max_retries => {
                attempt += 1;
                tracing::warn!(
                    operation,
                    attempt,
                    max_retries = policy.max_retries,
                    error = %e,
                    "Retrying ledger call"
                );
                tokio::time::sleep(backoff_delay(&policy, attempt)).await;
            }
            result => return result,
        }
    }
}
