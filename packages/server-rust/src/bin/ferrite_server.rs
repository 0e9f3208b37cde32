//! Entry point: parses configuration, wires up the event loop and accept
//! loop, and waits for `SIGINT`/`SIGTERM` to begin a graceful shutdown.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use ferrite_server::config::ServerConfig;
use ferrite_server::net::run_accept_loop;
use ferrite_server::server;
use ferrite_server::session::ClientRegistry;
use ferrite_server::shutdown::ShutdownController;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ServerConfig::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&config.log_filter).unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    server::ensure_data_dir(&config.data_dir).with_context(|| format!("creating data directory {}", config.data_dir.display()))?;

    let listener = TcpListener::bind((config.host.as_str(), config.port))
        .await
        .with_context(|| format!("binding {}:{}", config.host, config.port))?;
    let local_addr = listener.local_addr().context("reading bound listener address")?;

    let clients = Arc::new(ClientRegistry::new(config.push_slot_capacity()));
    let (state, inbound_rx, inbound_tx) = server::build(config.clone(), Arc::clone(&clients)).context("recovering server state")?;
    let shutdown = Arc::new(ShutdownController::new());

    let loop_handle = tokio::spawn(server::run(state, inbound_rx, Arc::clone(&shutdown)));
    let accept_handle = tokio::spawn(run_accept_loop(
        listener,
        inbound_tx,
        Arc::clone(&clients),
        config.max_clients,
        Arc::clone(&shutdown),
    ));

    shutdown.set_ready();
    info!(%local_addr, "ferrite-server listening");

    wait_for_termination().await;
    info!("shutdown signal received, draining");
    shutdown.trigger_shutdown();

    let _ = tokio::time::timeout(DRAIN_TIMEOUT, accept_handle).await;
    let _ = tokio::time::timeout(DRAIN_TIMEOUT, loop_handle).await;
    shutdown.wait_for_drain(DRAIN_TIMEOUT).await;

    info!("ferrite-server stopped");
    Ok(())
}

/// Waits for either `SIGINT` (Ctrl-C) or `SIGTERM`.
async fn wait_for_termination() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("installing SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
