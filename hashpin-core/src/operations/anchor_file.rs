use crate::content_store::{ContentIdentifier, ContentStore};
use crate::error::{HashpinError, Result};
use crate::ledger::LedgerClient;
use crate::status::{StatusChannel, StatusReport, UploadStatus};
use bytes::Bytes;
use std::sync::Arc;
use tokio::sync::watch;

/// File chosen for a run. Replaced wholesale by subsequent selections, never
/// mutated in place.
#[derive(Debug, Clone)]
pub struct SelectedFile {
    pub payload: Bytes,
    pub display_name: String,
}

/// The upload-then-anchor pipeline: upload the file to the content store,
/// then record the returned identifier on the ledger, projecting each phase
/// into the status channel. One run at a time per instance.
pub struct AnchorFileOperation {
    content_store: Arc<dyn ContentStore>,
    ledger: Arc<LedgerClient>,
    status: StatusChannel,
    in_flight: tokio::sync::Mutex<()>,
}

#[derive(Debug, Clone)]
pub struct AnchorFileOperationRequest {
    pub file: Option<SelectedFile>,
}

#[derive(Debug, Clone)]
pub struct AnchorFileOperationResult {
    pub identifier: ContentIdentifier,
    pub tx_hash: String,
}

impl AnchorFileOperation {
    pub fn new(content_store: Arc<dyn ContentStore>, ledger: Arc<LedgerClient>) -> Self {
        Self {
            content_store,
            ledger,
            status: StatusChannel::new(),
            in_flight: tokio::sync::Mutex::new(()),
        }
    }

    pub fn subscribe_status(&self) -> watch::Receiver<StatusReport> {
        self.status.subscribe()
    }

    pub fn status(&self) -> StatusReport {
        self.status.current()
    }

    pub async fn run(&self, request: AnchorFileOperationRequest) -> Result<AnchorFileOperationResult> {
        let Some(file) = request.file else {
            // Precondition failure: status stays untouched and neither
            // client is invoked.
            return Err(HashpinError::Validation("no file selected".to_string()));
        };

        let _guard = self
            .in_flight
            .try_lock()
            .map_err(|_| HashpinError::RunInProgress)?;

        self.status.set(UploadStatus::Uploading);
        let identifier = match self
            .content_store
            .upload(file.payload.clone(), &file.display_name)
            .await
        {
            Ok(identifier) => identifier,
            Err(error) => return Err(self.fail(error)),
        };

        self.status.set(UploadStatus::Anchoring);
        let handle = match self.ledger.submit_anchor(&identifier).await {
            Ok(handle) => handle,
            Err(error) => return Err(self.fail(error)),
        };

        self.status.set(UploadStatus::Confirming);
        if let Err(error) = self.ledger.await_finality(&handle).await {
            return Err(self.fail(error));
        }

        self.status.set(UploadStatus::Success);
        tracing::info!(
            "Anchored '{}' as {} in transaction {}",
            file.display_name,
            identifier,
            handle.tx_hash
        );
        Ok(AnchorFileOperationResult {
            identifier,
            tx_hash: handle.tx_hash,
        })
    }

    fn fail(&self, error: HashpinError) -> HashpinError {
        tracing::warn!("Anchor run failed: {}", error);
        self.status.set_error(error.to_string());
        error
    }
}
