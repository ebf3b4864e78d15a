//! Wire protocol
//!
//! Length-prefixed JSON messages carrying command batches. The batch is the
//! unit of delivery: commands inside it run in order, and every command comes
//! back with its own status code.

use serde::{Deserialize, Serialize};

use crate::command::{CommandRequest, CommandResponse};

// Constants
pub const MAX_MESSAGE_SIZE: usize = 1024 * 1024; // 1MB max message size

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ClientMessage {
    ExecuteBatch { commands: Vec<CommandRequest> },
    Ping,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServerMessage {
    BatchResult {
        results: Vec<CommandResponse>,
        execution_time_ms: u64,
    },
    Pong,
    Error {
        code: ErrorCode,
        message: String,
        details: Option<String>,
    },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ErrorCode {
    ProtocolError,
    InternalError,
}

impl ClientMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        serde_json::to_vec(self).map_err(|e| e.to_string())
    }
}

impl ServerMessage {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, String> {
        serde_json::from_slice(bytes).map_err(|e| e.to_string())
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, String> {
        serde_json::to_vec(self).map_err(|e| e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::StatusCode;
    use serde_json::json;

    #[test]
    fn test_message_serialization() {
        let message = ClientMessage::ExecuteBatch {
            commands: vec![CommandRequest::with_value(
                "CreateDocument",
                json!({ "collection": "widgets", "data": { "name": "a" } }),
            )],
        };

        let bytes = message.to_bytes().unwrap();
        let parsed = ClientMessage::from_bytes(&bytes).unwrap();

        match parsed {
            ClientMessage::ExecuteBatch { commands } => {
                assert_eq!(commands.len(), 1);
                assert_eq!(commands[0].mapping, "CreateDocument");
            }
            _ => panic!("Message type mismatch"),
        }
    }

    #[test]
    fn test_batch_result_round_trip() {
        let message = ServerMessage::BatchResult {
            results: vec![CommandResponse::failure(
                "DoSomething".to_string(),
                StatusCode::Fail,
                "Unknown command".to_string(),
            )],
            execution_time_ms: 3,
        };

        let bytes = message.to_bytes().unwrap();
        match ServerMessage::from_bytes(&bytes).unwrap() {
            ServerMessage::BatchResult { results, .. } => {
                assert_eq!(results[0].result, StatusCode::Fail);
            }
            _ => panic!("Message type mismatch"),
        }
    }

    #[test]
    fn test_garbage_rejected() {
        assert!(ClientMessage::from_bytes(b"not json").is_err());
    }
}
