use tokio::sync::watch;

/// Phase marker for a pipeline run. Overwritten on every transition; readers
/// only ever observe the latest value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadStatus {
    Idle,
    Uploading,
    Anchoring,
    Confirming,
    Success,
    Error,
}

impl UploadStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, UploadStatus::Success | UploadStatus::Error)
    }

    fn default_message(self) -> &'static str {
        match self {
            UploadStatus::Idle => "Idle",
            UploadStatus::Uploading => "Uploading file to the pinning service...",
            UploadStatus::Anchoring => "Storing hash on the ledger...",
            UploadStatus::Confirming => "Waiting for transaction confirmation...",
            UploadStatus::Success => "File hash anchored successfully",
            UploadStatus::Error => "Error anchoring file",
        }
    }
}

impl std::fmt::Display for UploadStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.default_message())
    }
}

/// Latest phase plus its human-readable message. The structured error kind
/// is deliberately absent; callers wanting it use the operation's return
/// value instead.
#[derive(Debug, Clone)]
pub struct StatusReport {
    pub status: UploadStatus,
    pub message: String,
}

impl StatusReport {
    fn idle() -> Self {
        Self {
            status: UploadStatus::Idle,
            message: UploadStatus::Idle.to_string(),
        }
    }
}

/// Single-writer, multi-reader status cell backed by a watch channel. The
/// orchestrator holds the channel; any number of observers subscribe.
pub struct StatusChannel {
    tx: watch::Sender<StatusReport>,
}

impl StatusChannel {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(StatusReport::idle());
        Self { tx }
    }

    pub fn subscribe(&self) -> watch::Receiver<StatusReport> {
        self.tx.subscribe()
    }

    pub fn current(&self) -> StatusReport {
        self.tx.borrow().clone()
    }

    pub fn set(&self, status: UploadStatus) {
        self.tx.send_replace(StatusReport {
            status,
            message: status.to_string(),
        });
    }

    pub fn set_error(&self, message: impl Into<String>) {
        self.tx.send_replace(StatusReport {
            status: UploadStatus::Error,
            message: message.into(),
        });
    }
}

impl Default for StatusChannel {
    fn default() -> Self {
        Self::new()
    }
}
