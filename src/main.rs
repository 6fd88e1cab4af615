//! ttlkv server entry point.
//!
//! Builds the configuration, the store and the background tasks, then serves
//! connections until Ctrl+C / SIGTERM, at which point the shutdown
//! coordinator drains the background tasks in order.

use anyhow::Context;
use clap::Parser;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;
use ttlkv::commands::CommandHandler;
use ttlkv::config::Config;
use ttlkv::connection::{handle_connection, ConnectionStats};
use ttlkv::journal::AppendLog;
use ttlkv::shutdown::{shutdown_signal, ShutdownCoordinator};
use ttlkv::storage::{ExpirySweeper, Store};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::parse();
    config.validate()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    info!("ttlkv v{} starting", ttlkv::VERSION);

    // Shared by every connection and both background tasks
    let store = Arc::new(Store::from_config(&config));
    info!(
        default_ttl_secs = config.default_ttl_secs,
        sweep_interval_secs = config.sweep_interval_secs,
        "Store initialized"
    );

    let sweeper = ExpirySweeper::start(Arc::clone(&store));

    let log_writer = if config.logging_enabled {
        let log = AppendLog::from_config(Arc::clone(&store), &config, chrono::Utc::now());
        info!(path = %log.path().display(), "Append log enabled");
        Some(log.start())
    } else {
        None
    };

    let coordinator = ShutdownCoordinator::new(sweeper, log_writer);

    let listener = TcpListener::bind(config.bind_address())
        .await
        .with_context(|| format!("failed to bind {}", config.bind_address()))?;
    info!(
        "Listening on {} (write timeout {}s)",
        config.bind_address(),
        config.write_timeout_secs
    );

    let handler = CommandHandler::from_config(Arc::clone(&store), &config);
    let stats = Arc::new(ConnectionStats::new());

    tokio::select! {
        _ = accept_loop(listener, handler, &config, stats) => {}
        result = coordinator.run(shutdown_signal()) => result?,
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Accepts connections and spawns a task for each one.
async fn accept_loop(
    listener: TcpListener,
    handler: CommandHandler,
    config: &Config,
    stats: Arc<ConnectionStats>,
) {
    let idle_timeout = config.idle_timeout();

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                tokio::spawn(handle_connection(
                    stream,
                    addr,
                    handler.clone(),
                    idle_timeout,
                    Arc::clone(&stats),
                ));
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
