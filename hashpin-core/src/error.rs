use thiserror::Error;

pub type Result<T> = std::result::Result<T, HashpinError>;

/// Every failure in the upload-then-anchor pipeline. All variants are
/// terminal for the run that produced them; nothing is retried internally.
#[derive(Debug, Error)]
pub enum HashpinError {
    /// The run was invoked without a selected file.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The content store rejected or never received the upload.
    #[error("upload failed: {0}")]
    Upload(String),

    /// No wallet execution context is attached to the ledger client.
    #[error("wallet unavailable: {0}")]
    WalletUnavailable(String),

    /// The wallet holder declined the authorization request.
    #[error("authorization rejected: {0}")]
    UserRejected(String),

    /// Transaction submission or confirmation failed.
    #[error("transaction failed: {0}")]
    Transaction(String),

    #[error("configuration error: {0}")]
    Config(String),

    /// A run is already in flight on this orchestrator instance.
    #[error("another run is already in progress")]
    RunInProgress,

    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}
