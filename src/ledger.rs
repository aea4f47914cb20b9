//! Balance lookup against a remote Ethereum node.
//!
//! The [`LedgerQuery`] trait is the only thing the dispatch engine knows
//! about the ledger: one query per candidate, no batching, no caching, no
//! retry. The production implementation posts JSON-RPC 2.0 requests over
//! HTTP.

use std::time::Duration;

use async_trait::async_trait;
use primitive_types::U256;
use serde::Deserialize;
use thiserror::Error;

/// Errors from a balance lookup.
#[derive(Debug, Error)]
pub enum QueryError {
    /// The connection is permanently unusable (the response stream died
    /// mid-body). Continuing would silently drop all subsequent candidates,
    /// so this halts the whole scan.
    #[error("transport failed: {0}")]
    Transport(String),

    /// A single lookup failed. The candidate is logged, counted as checked,
    /// and skipped.
    #[error("lookup failed: {0}")]
    Lookup(String),
}

impl QueryError {
    /// Whether this error must halt the engine.
    pub fn is_fatal(&self) -> bool {
        matches!(self, QueryError::Transport(_))
    }
}

/// Abstract balance-lookup capability consumed by checker workers.
#[async_trait]
pub trait LedgerQuery: Send + Sync {
    /// The balance of `address` in wei, at the latest block.
    async fn balance(&self, address: &str) -> Result<U256, QueryError>;
}

/// JSON-RPC client querying `eth_getBalance` against a single endpoint.
pub struct HttpLedger {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpLedger {
    /// Build a client for the given endpoint, e.g. `http://127.0.0.1:8545`.
    pub fn new(endpoint: &str) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }

    /// Verify the endpoint answers at all (one `eth_blockNumber` call).
    ///
    /// Run before any worker starts so an unreachable node is a startup
    /// error rather than an endless stream of skipped candidates.
    pub async fn probe(&self) -> anyhow::Result<()> {
        let response = self
            .call("eth_blockNumber", serde_json::json!([]))
            .await
            .map_err(|e| anyhow::anyhow!("endpoint {} is unreachable: {}", self.endpoint, e))?;

        tracing::debug!(endpoint = %self.endpoint, block = ?response, "endpoint probe ok");
        Ok(())
    }

    async fn call(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<serde_json::Value, QueryError> {
        let response: RpcResponse = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({
                "jsonrpc": "2.0",
                "method": method,
                "params": params,
                "id": 1
            }))
            .send()
            .await
            .map_err(classify)?
            .json()
            .await
            .map_err(classify)?;

        if let Some(err) = response.error {
            return Err(QueryError::Lookup(format!("rpc error: {}", err)));
        }

        response
            .result
            .ok_or_else(|| QueryError::Lookup("no result in response".to_string()))
    }
}

#[async_trait]
impl LedgerQuery for HttpLedger {
    async fn balance(&self, address: &str) -> Result<U256, QueryError> {
        let result = self
            .call("eth_getBalance", serde_json::json!([address, "latest"]))
            .await?;

        let quantity = result
            .as_str()
            .ok_or_else(|| QueryError::Lookup(format!("non-string balance: {}", result)))?;

        parse_quantity(quantity)
    }
}

/// JSON-RPC 2.0 response envelope.
#[derive(Deserialize)]
struct RpcResponse {
    result: Option<serde_json::Value>,
    error: Option<serde_json::Value>,
}

/// Split transient from transport-fatal HTTP errors. A body that ends
/// prematurely means the connection itself is gone; anything else (timeout,
/// refused connection, bad status, malformed JSON) only costs one candidate.
fn classify(err: reqwest::Error) -> QueryError {
    if err.is_body() {
        QueryError::Transport(err.to_string())
    } else {
        QueryError::Lookup(err.to_string())
    }
}

/// Parse a JSON-RPC hex quantity (`0x`-prefixed) into a `U256`.
fn parse_quantity(text: &str) -> Result<U256, QueryError> {
    let digits = text.strip_prefix("0x").unwrap_or(text);
    U256::from_str_radix(digits, 16)
        .map_err(|e| QueryError::Lookup(format!("bad balance quantity {:?}: {}", text, e)))
}
