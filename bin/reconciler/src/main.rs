use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy_primitives::Address;
use clap::Parser;
use eyre::Result;
use std::{path::PathBuf, sync::Arc};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reconciler::chain::{ChainReader, HttpChainReader, LogWatcher, WatcherConfig};
use reconciler::claims::{ClaimTracker, ExpirySweeper, NonceRegistry, SignatureService, SignerConfig};
use reconciler::config::ServiceConfig;
use reconciler::directory::{InMemoryPosts, InMemoryTokens, InMemoryWallets};
use reconciler::ledger::{LedgerStore, Reconciler};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = "./configs/dev/reconciler.json")]
    config_path: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting reward reconciler");

    let config_path = PathBuf::from(&cli.config_path);
    let config = if config_path.exists() {
        let mut cfg = ServiceConfig::load_from_file(&config_path).await?;
        cfg.polling = cfg.polling.with_env_overrides();
        cfg
    } else {
        tracing::warn!("Config file not found, using defaults");
        let mut cfg = ServiceConfig::default();
        cfg.polling = cfg.polling.with_env_overrides();
        cfg
    };

    tracing::info!(
        rpc_url = %config.blockchain.rpc_url,
        chain_id = config.blockchain.chain_id,
        poll_secs = config.polling.interval_secs,
        "Config loaded"
    );

    // Owned state
    let ledger = Arc::new(LedgerStore::new());
    let tracker = Arc::new(ClaimTracker::new());
    let nonces = Arc::new(NonceRegistry::new());

    // Collaborators; the embedding application swaps in its own
    let wallets = Arc::new(InMemoryWallets::new());
    let posts = Arc::new(InMemoryPosts::new());
    let tokens = Arc::new(InMemoryTokens::new());

    // Signer key never lives in the config file
    let signer = match std::env::var("SIGNER_PRIVATE_KEY") {
        Ok(key) => match key.parse::<PrivateKeySigner>() {
            Ok(signer) => {
                tracing::info!(signer = %signer.address(), "Claim signer loaded");
                Some(signer)
            }
            Err(e) => {
                tracing::warn!("SIGNER_PRIVATE_KEY invalid, claim issuance disabled: {}", e);
                None
            }
        },
        Err(_) => None,
    };

    let signer_config = SignerConfig {
        domain_name: config.signing.domain_name.clone(),
        domain_version: config.signing.domain_version.clone(),
        chain_id: config.blockchain.chain_id,
        verifying_contract: config.signing.verifying_contract.parse().ok(),
        claim_ttl_secs: config.signing.claim_ttl_secs,
        trusted_signer: config
            .signing
            .trusted_signer
            .as_deref()
            .and_then(|s| s.parse().ok()),
    };

    let signature_service = Arc::new(SignatureService::new(
        signer_config,
        signer,
        config.blockchain.token_decimals,
        nonces.clone(),
        tracker.clone(),
        wallets.clone(),
        posts.clone(),
        tokens.clone(),
    ));
    tracing::info!(configured = signature_service.is_configured(), "Signature service ready");

    let provider = ProviderBuilder::new().connect_http(config.blockchain.rpc_url.parse()?);
    let reader: Arc<dyn ChainReader> = Arc::new(HttpChainReader::new(provider));

    // Expiry sweeper runs regardless of watcher configuration
    let sweeper = ExpirySweeper::new(tracker.clone(), config.polling.sweep_interval_secs);
    let sweeper_cancel = sweeper.cancel_token();
    let sweeper_handle = tokio::spawn(sweeper.run());

    let contract_address = config.blockchain.contract_address.parse::<Address>();

    let watcher_handles = match contract_address {
        Ok(contract_address) => {
            let engine = Arc::new(Reconciler::new(
                ledger.clone(),
                tracker.clone(),
                nonces.clone(),
                wallets.clone(),
                posts.clone(),
                reader.clone(),
                contract_address,
                config.blockchain.token_decimals,
            ));

            let (event_tx, mut event_rx) = tokio::sync::mpsc::unbounded_channel();
            let watcher = LogWatcher::new(
                WatcherConfig {
                    contract_address,
                    poll_interval_secs: config.polling.interval_secs,
                    cold_start_window_blocks: config.polling.cold_start_window_blocks,
                },
                reader.clone(),
                event_tx,
            );
            let watcher_cancel = watcher.cancel_token();

            // Watcher emits, this task reconciles; one bad event never
            // stops the stream
            let engine_for_events = engine.clone();
            let processor_handle = tokio::spawn(async move {
                while let Some(event) = event_rx.recv().await {
                    engine_for_events.handle_event(&event).await;
                }
            });

            let watcher_for_run = watcher.clone();
            let watcher_handle = tokio::spawn(async move {
                if let Err(e) = watcher_for_run.run().await {
                    tracing::error!("Watcher error: {}", e);
                }
            });

            tracing::info!(contract = %contract_address, "Watcher started");
            Some((watcher_handle, processor_handle, watcher_cancel, watcher))
        }
        Err(_) => {
            // Fatal configuration for the watcher only; the rest of the
            // application keeps operating
            tracing::warn!("No valid contract address configured, watcher disabled");
            None
        }
    };

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutting down");

    sweeper_cancel.cancel();
    let _ = sweeper_handle.await;

    if let Some((watcher_handle, processor_handle, watcher_cancel, watcher)) = watcher_handles {
        watcher_cancel.cancel();
        let _ = watcher_handle.await;
        drop(watcher);
        let _ = processor_handle.await;
    }

    tracing::info!("Reconciler stopped");
    Ok(())
}
