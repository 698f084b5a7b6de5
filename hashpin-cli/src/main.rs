use clap::{Parser, Subcommand};
use hashpin_core::{
    AnchorFileOperation, AnchorFileOperationRequest, Config, ContractDescriptor, JsonRpcWallet,
    LedgerClient, PinataClient, SelectedFile, WalletContext,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

#[derive(Parser)]
#[command(name = "hashpin")]
#[command(about = "Pin a file to IPFS and anchor its hash on-chain")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml", global = true)]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Upload a file to the pinning service and anchor its hash
    Anchor {
        /// File to upload
        #[arg(short, long)]
        file: PathBuf,

        /// Display name recorded in the pin metadata (defaults to the file name)
        #[arg(long)]
        name: Option<String>,
    },
    /// Anchor an already-pinned content identifier without re-uploading
    Record {
        /// The content identifier to record on-chain
        cid: String,
    },
    /// Print the hash currently anchored on the contract
    Current,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "hashpin=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = match Config::from_file(&cli.config) {
        Ok(config) => config,
        Err(error) => {
            tracing::error!("Failed to load config: {}", error);
            std::process::exit(1);
        }
    };

    let ledger = match build_ledger(&config) {
        Ok(ledger) => ledger,
        Err(error) => {
            tracing::error!("Failed to build ledger client: {}", error);
            std::process::exit(1);
        }
    };

    match cli.command {
        Commands::Anchor { file, name } => {
            let payload = match tokio::fs::read(&file).await {
                Ok(bytes) => bytes,
                Err(error) => {
                    tracing::error!("Failed to read {}: {}", file.display(), error);
                    std::process::exit(1);
                }
            };
            let display_name = name.unwrap_or_else(|| {
                file.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "file".to_string())
            });

            let store = Arc::new(PinataClient::new(config.content_store.clone()));
            let operation = AnchorFileOperation::new(store, ledger);

            let mut status_rx = operation.subscribe_status();
            let reporter = tokio::spawn(async move {
                while status_rx.changed().await.is_ok() {
                    let report = status_rx.borrow().clone();
                    tracing::info!("{}", report.message);
                    if report.status.is_terminal() {
                        break;
                    }
                }
            });

            let request = AnchorFileOperationRequest {
                file: Some(SelectedFile {
                    payload: payload.into(),
                    display_name,
                }),
            };
            let outcome = operation.run(request).await;
            let _ = reporter.await;

            match outcome {
                Ok(result) => {
                    tracing::info!(
                        "Pinned as {} and anchored in transaction {}",
                        result.identifier,
                        result.tx_hash
                    );
                }
                Err(error) => {
                    tracing::error!("Anchor run failed: {}", error);
                    std::process::exit(1);
                }
            }
        }
        Commands::Record { cid } => {
            let identifier = hashpin_core::ContentIdentifier::new(cid);
            match ledger.anchor(&identifier).await {
                Ok(handle) => {
                    tracing::info!("Anchored {} in transaction {}", identifier, handle.tx_hash);
                }
                Err(error) => {
                    tracing::error!("Failed to anchor {}: {}", identifier, error);
                    std::process::exit(1);
                }
            }
        }
        Commands::Current => match ledger.current_hash().await {
            Ok(hash) => {
                println!("{}", hash);
            }
            Err(error) => {
                tracing::error!("Failed to read anchored hash: {}", error);
                std::process::exit(1);
            }
        },
    }
}

fn build_ledger(config: &Config) -> hashpin_core::Result<Arc<LedgerClient>> {
    let descriptor = Arc::new(ContractDescriptor::builtin(
        config.ledger.contract_address.clone(),
    )?);
    let wallet: Option<Arc<dyn WalletContext>> = config.ledger.rpc_url.as_ref().map(|url| {
        Arc::new(JsonRpcWallet::new(
            url.clone(),
            Duration::from_millis(config.ledger.receipt_poll_interval_ms),
        )) as Arc<dyn WalletContext>
    });
    Ok(Arc::new(LedgerClient::new(
        wallet,
        descriptor,
        config.ledger.clone(),
    )))
}
