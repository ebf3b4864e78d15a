//! DocBridge Server Executable
//!
//! Standalone carrier for the command batch protocol: loads the TOML
//! configuration, serves TCP clients, reloads the store settings on SIGHUP,
//! and shuts down on SIGINT/SIGTERM.

use colored::Colorize;
use docbridge_core::{BridgeServer, Config};
use std::sync::Arc;
use tracing_subscriber::{filter::EnvFilter, fmt};

const DEFAULT_CONFIG_PATH: &str = "docbridge.toml";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    let config = Config::load_from_path(DEFAULT_CONFIG_PATH)?;

    println!("{}", "Starting DocBridge...".bright_green());
    println!("Configuration:");
    println!(
        "  Listen: {}",
        format!("{}:{}", config.server.host, config.server.port).bright_cyan()
    );
    println!("  Database: {}", config.mongo.database_name.bright_cyan());
    println!(
        "  Max Connections: {}",
        config.server.max_connections.to_string().bright_cyan()
    );

    let server = Arc::new(BridgeServer::connect(config).await?);

    // SIGHUP reloads the config file and swaps the store adapter in place
    spawn_reload_handler(Arc::clone(&server));

    let server_for_shutdown = Arc::clone(&server);
    let shutdown_handle = tokio::spawn(async move {
        wait_for_shutdown_signal().await;
        println!("\n{}", "Received shutdown signal".bright_yellow());
        server_for_shutdown.shutdown();
    });

    tokio::select! {
        result = server.start() => result?,
        _ = shutdown_handle => {}
    }

    println!("{}", "DocBridge stopped".bright_green());
    Ok(())
}

fn spawn_reload_handler(server: Arc<BridgeServer>) {
    #[cfg(unix)]
    tokio::spawn(async move {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sighup = match signal(SignalKind::hangup()) {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGHUP handler");
                return;
            }
        };

        while sighup.recv().await.is_some() {
            tracing::info!("SIGHUP received, reloading configuration");
            match Config::load_from_path(DEFAULT_CONFIG_PATH) {
                Ok(config) => match server.dispatcher().reconfigure(config.mongo).await {
                    Ok(true) => tracing::info!("store settings changed, adapter rebuilt"),
                    Ok(false) => tracing::info!("store settings unchanged"),
                    Err(e) => tracing::error!(error = %e, "reconfiguration failed"),
                },
                Err(e) => tracing::error!(error = %e, "failed to reload configuration"),
            }
        }
    });

    #[cfg(not(unix))]
    let _ = server;
}

async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};

        let mut sigint = signal(SignalKind::interrupt()).expect("Failed to create SIGINT handler");
        let mut sigterm =
            signal(SignalKind::terminate()).expect("Failed to create SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => {},
            _ = sigterm.recv() => {},
        }
    }

    #[cfg(not(unix))]
    {
        use tokio::signal;
        signal::ctrl_c().await.expect("Failed to listen for ctrl-c");
    }
}
