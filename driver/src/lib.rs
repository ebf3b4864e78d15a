//! Thin async client for the DocBridge wire protocol.

use docbridge_core::network::NetworkConnection;
use docbridge_core::network::protocol::{ClientMessage, ServerMessage};
use docbridge_core::{BridgeError, BridgeResult, CommandRequest, CommandResponse};
use serde_json::{Value, json};
use std::time::Duration;
use tokio::net::TcpStream;

/// How long to wait for a server response before giving up on the connection.
const RESPONSE_TIMEOUT: Duration = Duration::from_secs(60);

pub struct BridgeDriver {
    connection: Option<NetworkConnection>,
    server_address: String,
}

impl BridgeDriver {
    pub fn new() -> Self {
        Self::with_server("127.0.0.1:4328".to_string())
    }

    pub fn with_server(address: String) -> Self {
        Self {
            connection: None,
            server_address: address,
        }
    }

    /// Connect and verify the server answers a ping.
    pub async fn connect(&mut self) -> BridgeResult<()> {
        if self.connection.is_some() {
            return Ok(());
        }

        let stream = TcpStream::connect(&self.server_address).await.map_err(|e| {
            BridgeError::Connection(format!(
                "Failed to connect to {}: {}",
                self.server_address, e
            ))
        })?;

        let mut connection = NetworkConnection::with_read_timeout(stream, RESPONSE_TIMEOUT);
        connection.send_message(ClientMessage::Ping).await?;

        match connection.read_response().await? {
            Some(ServerMessage::Pong) => {
                self.connection = Some(connection);
                Ok(())
            }
            Some(ServerMessage::Error { message, .. }) => Err(BridgeError::Protocol(format!(
                "Server error during ping: {}",
                message
            ))),
            Some(response) => Err(BridgeError::Protocol(format!(
                "Unexpected response to ping: {:?}",
                response
            ))),
            None => Err(BridgeError::Connection(
                "Connection closed during handshake".to_string(),
            )),
        }
    }

    /// Execute one command batch and return the per-command results in order.
    pub async fn execute_batch(
        &mut self,
        commands: Vec<CommandRequest>,
    ) -> BridgeResult<Vec<CommandResponse>> {
        self.connect().await?;

        // connect() above guarantees the connection exists
        let connection = self.connection.as_mut().ok_or_else(|| {
            BridgeError::Connection("Not connected".to_string())
        })?;

        if let Err(e) = connection
            .send_message(ClientMessage::ExecuteBatch { commands })
            .await
        {
            self.connection = None;
            return Err(e);
        }

        match connection.read_response().await {
            Ok(Some(ServerMessage::BatchResult { results, .. })) => Ok(results),
            Ok(Some(ServerMessage::Error { message, details, .. })) => {
                Err(BridgeError::Protocol(match details {
                    Some(details) => format!("{}: {}", message, details),
                    None => message,
                }))
            }
            Ok(Some(response)) => Err(BridgeError::Protocol(format!(
                "Unexpected response: {:?}",
                response
            ))),
            Ok(None) => {
                self.connection = None;
                Err(BridgeError::Connection(
                    "Connection closed by server".to_string(),
                ))
            }
            Err(e) => {
                self.connection = None;
                Err(e)
            }
        }
    }

    async fn execute_one(&mut self, command: CommandRequest) -> BridgeResult<CommandResponse> {
        let mut results = self.execute_batch(vec![command]).await?;
        results.pop().ok_or_else(|| {
            BridgeError::Protocol("Server returned an empty batch result".to_string())
        })
    }

    pub async fn collection_list(&mut self) -> BridgeResult<CommandResponse> {
        self.execute_one(CommandRequest::new("CollectionList")).await
    }

    pub async fn create_document(
        &mut self,
        collection: &str,
        data: Value,
    ) -> BridgeResult<CommandResponse> {
        self.execute_one(CommandRequest::with_value(
            "CreateDocument",
            json!({ "collection": collection, "data": data }),
        ))
        .await
    }

    pub async fn update_document(
        &mut self,
        collection: &str,
        data: Value,
    ) -> BridgeResult<CommandResponse> {
        self.execute_one(CommandRequest::with_value(
            "UpdateDocument",
            json!({ "collection": collection, "data": data }),
        ))
        .await
    }

    pub async fn remove_document(
        &mut self,
        collection: &str,
        id: &str,
    ) -> BridgeResult<CommandResponse> {
        self.execute_one(CommandRequest::with_value(
            "RemoveDocument",
            json!({ "collection": collection, "id": id }),
        ))
        .await
    }

    pub async fn create_collection(&mut self, name: &str) -> BridgeResult<CommandResponse> {
        self.execute_one(CommandRequest::with_value("CreateCollection", json!(name)))
            .await
    }

    pub async fn set_aggregation_pipeline(
        &mut self,
        pipeline_id: u8,
        collection: &str,
        stages: Value,
    ) -> BridgeResult<CommandResponse> {
        self.execute_one(CommandRequest::with_value(
            "SetAggregationPipeline",
            json!({ "collection": collection, "data": stages, "pipelineId": pipeline_id }),
        ))
        .await
    }

    pub async fn aggregation_output(&mut self, pipeline_id: u8) -> BridgeResult<CommandResponse> {
        self.execute_one(CommandRequest::new(format!(
            "AggregationOutputList{}",
            pipeline_id
        )))
        .await
    }

    pub async fn get_aggregation_result(
        &mut self,
        collection: &str,
        stages: Value,
    ) -> BridgeResult<CommandResponse> {
        self.execute_one(CommandRequest::with_value(
            "GetAggregationResult",
            json!({ "collection": collection, "data": stages }),
        ))
        .await
    }

    pub async fn disconnect(&mut self) -> BridgeResult<()> {
        if let Some(mut connection) = self.connection.take() {
            connection.close().await?;
        }
        Ok(())
    }
}

impl Default for BridgeDriver {
    fn default() -> Self {
        Self::new()
    }
}
