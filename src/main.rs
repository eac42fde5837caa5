//! Lock-and-mint relayer
//!
//! Watches one source chain for `TokensLocked` events and relays each as a
//! `mintTokens` call on the destination chain.
//!
//! # Lifecycle
//!
//! 1. Load and validate configuration (fatal on error)
//! 2. Connect to both chains (fatal on error)
//! 3. Resolve the scan cursor from the store, or from `INITIAL_SCAN_BLOCK`
//! 4. Scan, translate and submit in bounded chunks; sleep when caught up
//! 5. On SIGINT/SIGTERM, finish the current cycle, save the cursor and exit 0
//!
//! Submissions are signed but not broadcast unless `DRY_RUN=false`.

use std::sync::Arc;

use eyre::WrapErr;
use tracing::{error, info, warn};

use relayer::chain::{ChainClient, EvmChainClient};
use relayer::config::{Config, CursorBackend, LogFormat};
use relayer::cursor::{CursorStore, FileCursorStore, PairId, PgCursorStore};
use relayer::pipeline::SubmissionPipeline;
use relayer::relay::RelayLoop;
use relayer::scanner::EventScanner;
use relayer::server;
use relayer::translator::RelayTranslator;

fn main() -> eyre::Result<()> {
    color_eyre::install()?;

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(async_main())
}

async fn async_main() -> eyre::Result<()> {
    let config = Config::load()?;
    init_logging(config.log_format);

    info!("Starting lock-and-mint relayer");
    info!(
        source_rpc = %config.source_rpc_url,
        destination_rpc = %config.destination_rpc_url,
        source_contract = %config.source_contract,
        destination_contract = %config.destination_contract,
        max_blocks_per_scan = config.max_blocks_per_scan,
        polling_interval_seconds = config.polling_interval_seconds,
        confirmations = config.confirmations,
        "Configuration loaded"
    );

    let settings = config.relay_settings()?;
    let credential = config.load_credential()?;
    info!(relayer_address = %credential.address(), "Relayer credential loaded");

    let source = Arc::new(
        EvmChainClient::connect(&config.source_rpc_url)
            .await
            .wrap_err("Cannot connect to source chain")?,
    );
    let destination = Arc::new(
        EvmChainClient::connect(&config.destination_rpc_url)
            .await
            .wrap_err("Cannot connect to destination chain")?,
    );

    let pair = match &config.pair_id {
        Some(id) => PairId::new(id.clone()),
        None => PairId::from_chain_ids(source.chain_id(), destination.chain_id()),
    };

    let store: Arc<dyn CursorStore> = match &config.cursor_backend {
        CursorBackend::File { dir } => {
            let store = FileCursorStore::new(dir, pair.clone());
            info!(path = %store.path().display(), "Using file cursor store");
            Arc::new(store)
        }
        CursorBackend::Postgres { database_url } => {
            let store = PgCursorStore::connect(database_url.expose(), pair.clone()).await?;
            info!("Using Postgres cursor store");
            Arc::new(store)
        }
    };

    if config.dry_run {
        warn!("DRY_RUN is enabled: transactions will be signed but never broadcast");
    }

    let relay = RelayLoop::new(
        EventScanner::new(source, config.source_contract_address()?),
        RelayTranslator::new(config.destination_contract_address()?),
        SubmissionPipeline::new(destination, credential, config.dry_run, config.gas_limit),
        store,
        pair.clone(),
        settings,
    );
    let stats = relay.stats().clone();
    let metrics = relay.metrics().clone();

    let bind_address = config.health_bind_address.clone();
    let health_port = config.health_port;
    tokio::spawn(async move {
        if let Err(e) = server::start_server(&bind_address, health_port, stats, metrics).await {
            error!(error = %e, "Health server failed");
        }
    });

    let (shutdown_tx, shutdown_rx) = tokio::sync::mpsc::channel::<()>(1);
    tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        let _ = shutdown_tx.send(()).await;
    });

    info!(pair = %pair, "Relay loop starting");
    relay.run(shutdown_rx).await?;

    info!("Lock-and-mint relayer stopped");
    Ok(())
}

fn init_logging(format: LogFormat) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,lockmint_relayer=debug,relayer=debug"));

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Json => registry.with(fmt::layer().json().with_target(true)).init(),
        LogFormat::Text => registry.with(fmt::layer().with_target(true)).init(),
    }
}

async fn wait_for_shutdown_signal() {
    use tokio::signal;

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown");
        }
    }
}
