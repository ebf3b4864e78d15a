//! Bridge server
//!
//! Accepts client connections and hands them to the connection manager. The
//! dispatcher is shared across all connections; reconfiguration swaps its
//! store adapter without restarting the listener.

use crate::command::CommandDispatcher;
use crate::config::Config;
use crate::error::BridgeResult;
use crate::server::ConnectionManager;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

pub struct BridgeServer {
    config: Config,
    dispatcher: Arc<CommandDispatcher>,
    connection_manager: Arc<ConnectionManager>,
    shutdown_token: CancellationToken,
}

impl BridgeServer {
    /// Build the dispatcher from the mongo settings and prepare the server.
    pub async fn connect(config: Config) -> BridgeResult<Self> {
        let dispatcher = Arc::new(CommandDispatcher::connect(config.mongo.clone()).await?);
        let connection_manager = Arc::new(ConnectionManager::new(config.server.max_connections));

        Ok(Self {
            config,
            dispatcher,
            connection_manager,
            shutdown_token: CancellationToken::new(),
        })
    }

    /// Bind the configured address and serve until shutdown.
    pub async fn start(&self) -> BridgeResult<()> {
        let addr = format!("{}:{}", self.config.server.host, self.config.server.port);
        let listener = TcpListener::bind(&addr).await?;
        tracing::info!(%addr, "bridge server listening");

        self.serve(listener).await
    }

    /// Accept connections on an already-bound listener. Split out so tests
    /// can bind an ephemeral port themselves.
    pub async fn serve(&self, listener: TcpListener) -> BridgeResult<()> {
        loop {
            tokio::select! {
                result = listener.accept() => {
                    match result {
                        Ok((socket, addr)) => {
                            tracing::debug!(%addr, "new connection");

                            let connection_manager = Arc::clone(&self.connection_manager);
                            let dispatcher = Arc::clone(&self.dispatcher);
                            // Cancelling the server token also winds down open connections
                            let shutdown_token = self.shutdown_token.clone();

                            tokio::spawn(async move {
                                if let Err(e) = connection_manager.handle_connection(socket, dispatcher, shutdown_token).await {
                                    tracing::warn!(error = %e, "connection ended with error");
                                }
                            });
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to accept connection");
                        }
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    tracing::info!("shutdown requested, stopping connection acceptance");
                    break;
                }
            }
        }

        Ok(())
    }

    pub fn dispatcher(&self) -> Arc<CommandDispatcher> {
        Arc::clone(&self.dispatcher)
    }

    /// Gracefully shutdown the server
    pub fn shutdown(&self) {
        self.shutdown_token.cancel();
    }

    /// Get shutdown token for external shutdown coordination
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }
}
