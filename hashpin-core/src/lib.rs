//! Hashpin Core - Core library for the upload-then-anchor pipeline
//!
//! Pins a file to a remote content store (Pinata) and records the returned
//! content identifier on a deployed contract via an injected wallet
//! execution context:
//! - one multipart upload, no retries
//! - one `storeHash(string)` write with a fixed gas ceiling
//! - a single-writer status projection over a watch channel

pub mod config;
pub mod content_store;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod operations;
pub mod status;
pub mod wallet;

pub use config::{Config, ContentStoreConfig, LedgerConfig, PinataCredentials};
pub use content_store::{ContentIdentifier, ContentStore, PinataClient};
pub use contract::{AbiFunction, AbiParam, ContractDescriptor, StateMutability, ANCHOR_FUNCTION};
pub use error::{HashpinError, Result};
pub use ledger::LedgerClient;
pub use operations::{
    AnchorFileOperation, AnchorFileOperationRequest, AnchorFileOperationResult, SelectedFile,
};
pub use status::{StatusChannel, StatusReport, UploadStatus};
pub use wallet::{JsonRpcWallet, TransactionHandle, TransactionRequest, WalletContext};
