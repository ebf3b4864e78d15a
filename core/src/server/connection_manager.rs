//! Connection management for the bridge server
//!
//! Bounds concurrent client connections and runs the per-connection
//! read/dispatch/respond loop. One command's failure is reported in its own
//! status code; nothing here aborts sibling commands or other connections.

use crate::command::CommandDispatcher;
use crate::error::{BridgeError, BridgeResult};
use crate::network::NetworkConnection;
use crate::network::protocol::{ClientMessage, ErrorCode, ServerMessage};
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpStream;
use tokio::sync::Semaphore;
use tokio::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

pub struct ConnectionManager {
    max_connections: Arc<Semaphore>,
}

impl ConnectionManager {
    pub fn new(max_connections: usize) -> Self {
        Self {
            max_connections: Arc::new(Semaphore::new(max_connections)),
        }
    }

    pub async fn handle_connection(
        &self,
        socket: TcpStream,
        dispatcher: Arc<CommandDispatcher>,
        shutdown_token: CancellationToken,
    ) -> BridgeResult<()> {
        let _permit = self
            .max_connections
            .acquire()
            .await
            .map_err(|_| BridgeError::ConnectionLimit)?;

        Connection::new(socket, dispatcher, shutdown_token).run().await
    }
}

/// Represents a single client connection
struct Connection {
    id: Uuid,
    network_conn: NetworkConnection,
    dispatcher: Arc<CommandDispatcher>,
    connection_timeout: Duration,
    shutdown_token: CancellationToken,
}

impl Connection {
    fn new(
        socket: TcpStream,
        dispatcher: Arc<CommandDispatcher>,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            network_conn: NetworkConnection::new(socket),
            dispatcher,
            connection_timeout: Duration::from_secs(300), // 5 minutes
            shutdown_token,
        }
    }

    async fn run(mut self) -> BridgeResult<()> {
        tracing::debug!(id = %self.id, "connection started");

        loop {
            tokio::select! {
                message_result = self.network_conn.read_message() => {
                    match message_result {
                        Ok(Some(message)) => {
                            let response = self.handle_message(message).await;
                            if let Err(e) = self.network_conn.send_response(response).await {
                                tracing::warn!(id = %self.id, error = %e, "error sending response");
                                break;
                            }
                        }
                        Ok(None) => {
                            // Client disconnected
                            break;
                        }
                        Err(e) => {
                            tracing::warn!(id = %self.id, error = %e, "error reading message");
                            let error_response = ServerMessage::Error {
                                code: ErrorCode::ProtocolError,
                                message: format!("Connection error: {}", e),
                                details: None,
                            };
                            let _ = self.network_conn.send_response(error_response).await;
                            break;
                        }
                    }
                }
                // Server-side reads are unbounded, so idleness is caught here
                _ = tokio::time::sleep(self.connection_timeout) => {
                    if self.network_conn.is_idle(self.connection_timeout) {
                        tracing::debug!(id = %self.id, "connection timed out due to inactivity");
                        break;
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    break;
                }
            }
        }

        tracing::debug!(id = %self.id, "connection closed");
        Ok(())
    }

    async fn handle_message(&mut self, message: ClientMessage) -> ServerMessage {
        match message {
            ClientMessage::Ping => ServerMessage::Pong,
            ClientMessage::ExecuteBatch { commands } => {
                let start_time = Instant::now();
                let results = self.dispatcher.dispatch_batch(commands).await;
                ServerMessage::BatchResult {
                    results,
                    execution_time_ms: start_time.elapsed().as_millis() as u64,
                }
            }
        }
    }
}
