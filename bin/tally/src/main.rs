mod cli;
mod config_loader;

use clap::Parser;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tally_common::utils::logging::init_logging;
use tally_node::api::{build_router, ApiOptions};
use tally_node::{LedgerService, NodeConfig, SystemClock};
use tokio::signal;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = cli::Cli::parse();

    if let Some(cli::Commands::DefaultConfig) = args.command {
        print!("{}", NodeConfig::default().to_toml()?);
        return Ok(());
    }

    let config = config_loader::load_node_config(&args)?;
    init_logging(&config.logging).map_err(|e| anyhow::anyhow!("logging: {}", e))?;

    info!("Starting tally v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration:");
    info!("  Server address: {}", config.server_addr);
    info!("  Ledger address: {}", config.ledger_address);
    match &config.snapshot_path {
        Some(path) => info!("  Snapshot: {}", path.display()),
        None => info!("  Snapshot: disabled, state is lost on exit"),
    }

    let service = Arc::new(LedgerService::open(&config, Arc::new(SystemClock::new())).await?);
    let status = service.status().await;
    info!(
        "Ledger ready: owner {}, supply {}, {} accounts",
        status.owner, status.total_supply, status.account_count
    );

    let snapshot_task =
        service.spawn_snapshot_task(Duration::from_secs(config.snapshot_interval_secs));

    let app = build_router(
        service.clone(),
        ApiOptions {
            metrics_enabled: config.metrics_enabled,
            cors_enabled: config.cors_enabled,
        },
    );

    let addr: SocketAddr = config.server_addr.parse()?;
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let streams = service.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            streams.close_event_streams();
        })
        .await?;

    info!("Shutting down gracefully");
    if let Some(task) = snapshot_task {
        task.abort();
    }
    match service.persist().await {
        Ok(true) => info!("Ledger snapshot saved"),
        Ok(false) => {}
        Err(e) => {
            error!("Failed to persist ledger snapshot: {}", e);
            return Err(e.into());
        }
    }
    Ok(())
}

/// Graceful shutdown signal
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C");
        },
        _ = terminate => {
            info!("Received terminate signal");
        },
    }
}
