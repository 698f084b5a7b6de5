use crate::error::{HashpinError, Result};
use serde::{Deserialize, Serialize};

pub const PINATA_API_KEY_VAR: &str = "HASHPIN_PINATA_API_KEY";
pub const PINATA_API_SECRET_VAR: &str = "HASHPIN_PINATA_API_SECRET";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub content_store: ContentStoreConfig,
    pub ledger: LedgerConfig,
}

/// Pinning service settings. Credentials are intentionally absent here:
/// they come from the process environment and are resolved lazily at the
/// first upload attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentStoreConfig {
    #[serde(default = "default_pin_endpoint")]
    pub endpoint: String,
    /// Tag recorded in the pin metadata `keyvalues.uploadedBy` field.
    #[serde(default = "default_app_tag")]
    pub app_tag: String,
    /// CID version requested from the pinning service.
    #[serde(default)]
    pub cid_version: u8,
}

impl Default for ContentStoreConfig {
    fn default() -> Self {
        Self {
            endpoint: default_pin_endpoint(),
            app_tag: default_app_tag(),
            cid_version: 0,
        }
    }
}

fn default_pin_endpoint() -> String {
    "https://api.pinata.cloud/pinning/pinFileToIPFS".to_string()
}

fn default_app_tag() -> String {
    "hashpin".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerConfig {
    /// JSON-RPC endpoint of the wallet/node. When absent, no wallet context
    /// is attached and anchoring fails with a wallet-unavailable error.
    #[serde(default)]
    pub rpc_url: Option<String>,
    pub contract_address: String,
    /// Explicit gas ceiling for the anchor write. The target method's cost
    /// is not reliably estimable for a string-valued mutation.
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    #[serde(default = "default_confirmations")]
    pub confirmations: u64,
    /// Optional cap on the confirmation wait. Unset means wait forever;
    /// when set, expiry surfaces as a transaction error.
    #[serde(default)]
    pub confirmation_timeout_secs: Option<u64>,
    #[serde(default = "default_poll_interval_ms")]
    pub receipt_poll_interval_ms: u64,
}

fn default_gas_limit() -> u64 {
    300_000
}

fn default_confirmations() -> u64 {
    1
}

fn default_poll_interval_ms() -> u64 {
    2000
}

impl Config {
    pub fn from_file(path: &str) -> Result<Self> {
        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path))
            .add_source(::config::Environment::with_prefix("HASHPIN").separator("__"))
            .build()
            .map_err(|e| HashpinError::Config(e.to_string()))?;

        let config: Config = settings
            .try_deserialize()
            .map_err(|e| HashpinError::Config(e.to_string()))?;

        Ok(config)
    }
}

/// The two credential tokens the pinning service expects as request headers.
#[derive(Debug, Clone)]
pub struct PinataCredentials {
    pub api_key: String,
    pub api_secret: String,
}

impl PinataCredentials {
    /// Reads both tokens from the environment. Called at upload time, not at
    /// startup, so a misconfigured process fails on the first upload attempt
    /// rather than on boot.
    pub fn from_env() -> Result<Self> {
        let api_key = require_env(PINATA_API_KEY_VAR)?;
        let api_secret = require_env(PINATA_API_SECRET_VAR)?;
        Ok(Self {
            api_key,
            api_secret,
        })
    }
}

fn require_env(var: &str) -> Result<String> {
    match std::env::var(var) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(HashpinError::Config(format!(
            "missing credential environment variable '{}'",
            var
        ))),
    }
}
