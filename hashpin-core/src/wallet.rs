use crate::error::{HashpinError, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// A submitted but not-yet-final ledger write. Discarded once finality is
/// observed or an error is raised.
#[derive(Debug, Clone)]
pub struct TransactionHandle {
    pub tx_hash: String,
}

#[derive(Debug, Clone)]
pub struct TransactionRequest {
    pub from: String,
    pub to: String,
    pub data: Vec<u8>,
    pub gas_limit: u64,
}

/// The injected wallet execution context: account authorization, signed
/// submission, confirmation wait, and a read-only call primitive. The ledger
/// client owns the sequencing; implementations own the transport.
#[async_trait]
pub trait WalletContext: Send + Sync {
    /// Requests account authorization. May suspend indefinitely while a
    /// human decides; declining surfaces as a user-rejected error.
    async fn request_accounts(&self) -> Result<Vec<String>>;

    async fn submit(&self, request: TransactionRequest) -> Result<TransactionHandle>;

    /// Blocks until the ledger reports the transaction finalized with the
    /// given confirmation depth.
    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
        confirmations: u64,
    ) -> Result<()>;

    /// Read-only contract call, no state change and no authorization.
    async fn call(&self, to: &str, data: Vec<u8>) -> Result<Vec<u8>>;
}

/// EIP-1193: the user rejected the request.
const CODE_USER_REJECTED: i64 = 4001;

enum RpcFailure {
    Transport(String),
    Rpc { code: i64, message: String },
}

/// Wallet context backed by an Ethereum JSON-RPC endpoint (a local node or a
/// wallet daemon holding the signing key).
pub struct JsonRpcWallet {
    http: reqwest::Client,
    url: String,
    poll_interval: Duration,
    next_id: AtomicU64,
}

impl JsonRpcWallet {
    pub fn new(url: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            url: url.into(),
            poll_interval,
            next_id: AtomicU64::new(1),
        }
    }

    async fn rpc(&self, method: &str, params: Value) -> std::result::Result<Value, RpcFailure> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": self.next_id.fetch_add(1, Ordering::Relaxed),
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|error| RpcFailure::Transport(error.to_string()))?;

        if !response.status().is_success() {
            return Err(RpcFailure::Transport(format!(
                "rpc endpoint returned status {}",
                response.status()
            )));
        }

        let payload: Value = response
            .json()
            .await
            .map_err(|error| RpcFailure::Transport(error.to_string()))?;

        if let Some(error) = payload.get("error") {
            let code = error.get("code").and_then(Value::as_i64).unwrap_or(0);
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("unknown rpc error")
                .to_string();
            return Err(RpcFailure::Rpc { code, message });
        }

        Ok(payload.get("result").cloned().unwrap_or(Value::Null))
    }
}

fn parse_quantity(value: &Value) -> Result<u64> {
    let text = value
        .as_str()
        .ok_or_else(|| HashpinError::Transaction("expected a hex quantity".to_string()))?;
    u64::from_str_radix(text.trim_start_matches("0x"), 16)
        .map_err(|_| HashpinError::Transaction(format!("invalid hex quantity '{}'", text)))
}

#[async_trait]
impl WalletContext for JsonRpcWallet {
    async fn request_accounts(&self) -> Result<Vec<String>> {
        let result = self
            .rpc("eth_accounts", json!([]))
            .await
            .map_err(|failure| match failure {
                RpcFailure::Transport(message) => HashpinError::WalletUnavailable(message),
                RpcFailure::Rpc { code, message } if code == CODE_USER_REJECTED => {
                    HashpinError::UserRejected(message)
                }
                RpcFailure::Rpc { message, .. } => HashpinError::WalletUnavailable(message),
            })?;

        let accounts = result
            .as_array()
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();
        Ok(accounts)
    }

    async fn submit(&self, request: TransactionRequest) -> Result<TransactionHandle> {
        let params = json!([{
            "from": request.from,
            "to": request.to,
            "data": format!("0x{}", hex::encode(&request.data)),
            "gas": format!("0x{:x}", request.gas_limit),
        }]);

        let result = self
            .rpc("eth_sendTransaction", params)
            .await
            .map_err(|failure| match failure {
                RpcFailure::Rpc { code, message } if code == CODE_USER_REJECTED => {
                    HashpinError::UserRejected(message)
                }
                RpcFailure::Rpc { message, .. } => HashpinError::Transaction(message),
                RpcFailure::Transport(message) => HashpinError::Transaction(message),
            })?;

        let tx_hash = result
            .as_str()
            .ok_or_else(|| {
                HashpinError::Transaction("rpc endpoint returned no transaction hash".to_string())
            })?
            .to_string();

        tracing::debug!("Submitted transaction {}", tx_hash);
        Ok(TransactionHandle { tx_hash })
    }

    async fn await_confirmation(
        &self,
        handle: &TransactionHandle,
        confirmations: u64,
    ) -> Result<()> {
        loop {
            let receipt = self
                .rpc("eth_getTransactionReceipt", json!([handle.tx_hash]))
                .await
                .map_err(|failure| match failure {
                    RpcFailure::Transport(message) => HashpinError::Transaction(message),
                    RpcFailure::Rpc { message, .. } => HashpinError::Transaction(message),
                })?;

            if receipt.is_null() {
                tokio::time::sleep(self.poll_interval).await;
                continue;
            }

            if let Some(status) = receipt.get("status") {
                if parse_quantity(status)? == 0 {
                    return Err(HashpinError::Transaction(format!(
                        "transaction {} reverted",
                        handle.tx_hash
                    )));
                }
            }

            if confirmations <= 1 {
                return Ok(());
            }

            let mined_in = parse_quantity(receipt.get("blockNumber").ok_or_else(|| {
                HashpinError::Transaction("receipt is missing blockNumber".to_string())
            })?)?;
            let head = self
                .rpc("eth_blockNumber", json!([]))
                .await
                .map_err(|failure| match failure {
                    RpcFailure::Transport(message) => HashpinError::Transaction(message),
                    RpcFailure::Rpc { message, .. } => HashpinError::Transaction(message),
                })
                .and_then(|value| parse_quantity(&value))?;

            if head.saturating_sub(mined_in) + 1 >= confirmations {
                return Ok(());
            }

            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn call(&self, to: &str, data: Vec<u8>) -> Result<Vec<u8>> {
        let params = json!([{
            "to": to,
            "data": format!("0x{}", hex::encode(&data)),
        }, "latest"]);

        let result = self
            .rpc("eth_call", params)
            .await
            .map_err(|failure| match failure {
                RpcFailure::Transport(message) => HashpinError::Transaction(message),
                RpcFailure::Rpc { message, .. } => HashpinError::Transaction(message),
            })?;

        let text = result.as_str().ok_or_else(|| {
            HashpinError::Transaction("rpc endpoint returned no call data".to_string())
        })?;
        hex::decode(text.trim_start_matches("0x"))
            .map_err(|error| HashpinError::Transaction(error.to_string()))
    }
}
