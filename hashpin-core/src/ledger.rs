use crate::config::LedgerConfig;
use crate::content_store::ContentIdentifier;
use crate::contract::{decode_string_return, ContractDescriptor, ANCHOR_FUNCTION};
use crate::error::{HashpinError, Result};
use crate::wallet::{TransactionHandle, TransactionRequest, WalletContext};
use std::sync::Arc;
use std::time::Duration;

/// Drives the anchor write against the deployed contract through an injected
/// wallet execution context.
pub struct LedgerClient {
    wallet: Option<Arc<dyn WalletContext>>,
    descriptor: Arc<ContractDescriptor>,
    config: LedgerConfig,
}

impl LedgerClient {
    pub fn new(
        wallet: Option<Arc<dyn WalletContext>>,
        descriptor: Arc<ContractDescriptor>,
        config: LedgerConfig,
    ) -> Self {
        Self {
            wallet,
            descriptor,
            config,
        }
    }

    pub fn descriptor(&self) -> &ContractDescriptor {
        &self.descriptor
    }

    fn wallet(&self) -> Result<&Arc<dyn WalletContext>> {
        self.wallet.as_ref().ok_or_else(|| {
            HashpinError::WalletUnavailable(
                "no wallet execution context is attached".to_string(),
            )
        })
    }

    /// Authorization + submission half of the anchor write: require a wallet,
    /// request account authorization, bind `storeHash(identifier)` with the
    /// fixed gas ceiling, and submit.
    pub async fn submit_anchor(&self, identifier: &ContentIdentifier) -> Result<TransactionHandle> {
        let wallet = self.wallet()?;

        let accounts = wallet.request_accounts().await?;
        let from = accounts.into_iter().next().ok_or_else(|| {
            HashpinError::WalletUnavailable("wallet returned no authorized accounts".to_string())
        })?;

        let data = self
            .descriptor
            .encode_call_string(ANCHOR_FUNCTION, identifier.as_str())?;
        let request = TransactionRequest {
            from,
            to: self.descriptor.address.clone(),
            data,
            gas_limit: self.config.gas_limit,
        };

        let handle = wallet.submit(request).await?;
        tracing::info!(
            "Submitted anchor for {} as transaction {}",
            identifier,
            handle.tx_hash
        );
        Ok(handle)
    }

    /// Blocks until the submitted write is final. The wait is unbounded
    /// unless a confirmation timeout is configured.
    pub async fn await_finality(&self, handle: &TransactionHandle) -> Result<()> {
        let wallet = self.wallet()?;
        let wait = wallet.await_confirmation(handle, self.config.confirmations);
        match self.config.confirmation_timeout_secs {
            Some(secs) => tokio::time::timeout(Duration::from_secs(secs), wait)
                .await
                .map_err(|_| {
                    HashpinError::Transaction(format!(
                        "confirmation of {} timed out after {}s",
                        handle.tx_hash, secs
                    ))
                })?,
            None => wait.await,
        }
    }

    /// Full anchor write: submit, then wait for finality.
    pub async fn anchor(&self, identifier: &ContentIdentifier) -> Result<TransactionHandle> {
        let handle = self.submit_anchor(identifier).await?;
        self.await_finality(&handle).await?;
        Ok(handle)
    }

    /// Reads the currently anchored hash via the contract's `getHash` view.
    /// Not part of the anchor workflow; exposed for external inspection.
    pub async fn current_hash(&self) -> Result<String> {
        let wallet = self.wallet()?;
        let data = self.descriptor.encode_view_call("getHash")?;
        let raw = wallet.call(&self.descriptor.address, data).await?;
        decode_string_return(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const CONTRACT: &str = "0x648b26Ce4136Ea096e20f433FA31Cd357AeD392D";

    fn ledger_config() -> LedgerConfig {
        LedgerConfig {
            rpc_url: None,
            contract_address: CONTRACT.to_string(),
            gas_limit: 300_000,
            confirmations: 1,
            confirmation_timeout_secs: None,
            receipt_poll_interval_ms: 10,
        }
    }

    #[derive(Default)]
    struct StubWallet {
        reject_authorization: bool,
        hang_confirmation: bool,
        authorize_calls: AtomicUsize,
        submitted: Mutex<Vec<TransactionRequest>>,
        call_result: Mutex<Vec<u8>>,
    }

    #[async_trait]
    impl WalletContext for StubWallet {
        async fn request_accounts(&self) -> Result<Vec<String>> {
            self.authorize_calls.fetch_add(1, Ordering::SeqCst);
            if self.reject_authorization {
                return Err(HashpinError::UserRejected(
                    "user declined authorization".to_string(),
                ));
            }
            Ok(vec!["0xabc0000000000000000000000000000000000001".to_string()])
        }

        async fn submit(&self, request: TransactionRequest) -> Result<TransactionHandle> {
            self.submitted.lock().unwrap().push(request);
            Ok(TransactionHandle {
                tx_hash: "0xdeadbeef".to_string(),
            })
        }

        async fn await_confirmation(
            &self,
            _handle: &TransactionHandle,
            _confirmations: u64,
        ) -> Result<()> {
            if self.hang_confirmation {
                std::future::pending::<()>().await;
            }
            Ok(())
        }

        async fn call(&self, _to: &str, _data: Vec<u8>) -> Result<Vec<u8>> {
            Ok(self.call_result.lock().unwrap().clone())
        }
    }

    fn client_with(wallet: Option<Arc<dyn WalletContext>>, config: LedgerConfig) -> LedgerClient {
        let descriptor = Arc::new(ContractDescriptor::builtin(CONTRACT).unwrap());
        LedgerClient::new(wallet, descriptor, config)
    }

    #[tokio::test]
    async fn missing_wallet_fails_before_authorization() {
        let client = client_with(None, ledger_config());
        let err = client
            .anchor(&ContentIdentifier::new("Qm123abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, HashpinError::WalletUnavailable(_)));
    }

    #[tokio::test]
    async fn anchor_binds_store_hash_with_gas_ceiling() {
        let wallet = Arc::new(StubWallet::default());
        let client = client_with(Some(wallet.clone()), ledger_config());

        let identifier = ContentIdentifier::new("Qm123abc");
        client.anchor(&identifier).await.unwrap();

        let submitted = wallet.submitted.lock().unwrap();
        assert_eq!(submitted.len(), 1);
        let request = &submitted[0];
        assert_eq!(request.to, CONTRACT);
        assert_eq!(request.gas_limit, 300_000);

        let expected = ContractDescriptor::builtin(CONTRACT)
            .unwrap()
            .encode_call_string(ANCHOR_FUNCTION, "Qm123abc")
            .unwrap();
        assert_eq!(request.data, expected);
    }

    #[tokio::test]
    async fn rejected_authorization_never_submits() {
        let wallet = Arc::new(StubWallet {
            reject_authorization: true,
            ..StubWallet::default()
        });
        let client = client_with(Some(wallet.clone()), ledger_config());

        let err = client
            .submit_anchor(&ContentIdentifier::new("QmXYZ"))
            .await
            .unwrap_err();
        assert!(matches!(err, HashpinError::UserRejected(_)));
        assert_eq!(wallet.authorize_calls.load(Ordering::SeqCst), 1);
        assert!(wallet.submitted.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn current_hash_decodes_the_view_result() {
        let anchored = "QmYwAPJzv5CZsnA625s3Xf2nemtYgPpHdWEz79ojWnPbdG";
        let mut encoded = Vec::new();
        let mut word = [0u8; 32];
        word[31] = 32;
        encoded.extend_from_slice(&word);
        word = [0u8; 32];
        word[31] = anchored.len() as u8;
        encoded.extend_from_slice(&word);
        encoded.extend_from_slice(anchored.as_bytes());
        encoded.extend(std::iter::repeat(0u8).take((32 - anchored.len() % 32) % 32));

        let wallet = Arc::new(StubWallet::default());
        *wallet.call_result.lock().unwrap() = encoded;
        let client = client_with(Some(wallet), ledger_config());

        assert_eq!(client.current_hash().await.unwrap(), anchored);
    }

    #[tokio::test]
    async fn configured_timeout_converts_to_transaction_error() {
        let wallet = Arc::new(StubWallet {
            hang_confirmation: true,
            ..StubWallet::default()
        });
        let config = LedgerConfig {
            confirmation_timeout_secs: Some(0),
            ..ledger_config()
        };
        let client = client_with(Some(wallet), config);

        let err = client
            .anchor(&ContentIdentifier::new("Qm123abc"))
            .await
            .unwrap_err();
        assert!(matches!(err, HashpinError::Transaction(_)));
    }
}
