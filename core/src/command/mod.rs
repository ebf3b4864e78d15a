//! Command envelope
//!
//! Commands arrive in named batches: each carries a `mapping` name and an
//! optional structured write value, and comes back with a numeric status
//! code, an optional read value, and a diagnostic message on failure.

pub mod dispatcher;

pub use dispatcher::CommandDispatcher;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Per-command status code, serialized as its numeric value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum StatusCode {
    Success = 0,
    Fail = 1,
    UpdateDocumentFail = 10,
    CreateDocumentFail = 11,
    CreateCollectionFail = 12,
    DataWrongTypeOrEmpty = 13,
    RemoveDocumentFail = 14,
    SetAggregationPipelineFail = 15,
    GetAggregationResultFail = 16,
}

impl From<StatusCode> for u8 {
    fn from(code: StatusCode) -> u8 {
        code as u8
    }
}

impl TryFrom<u8> for StatusCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(StatusCode::Success),
            1 => Ok(StatusCode::Fail),
            10 => Ok(StatusCode::UpdateDocumentFail),
            11 => Ok(StatusCode::CreateDocumentFail),
            12 => Ok(StatusCode::CreateCollectionFail),
            13 => Ok(StatusCode::DataWrongTypeOrEmpty),
            14 => Ok(StatusCode::RemoveDocumentFail),
            15 => Ok(StatusCode::SetAggregationPipelineFail),
            16 => Ok(StatusCode::GetAggregationResultFail),
            other => Err(format!("Unknown status code: {}", other)),
        }
    }
}

/// One named command from a client batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandRequest {
    pub mapping: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub write_value: Option<Value>,
}

impl CommandRequest {
    pub fn new(mapping: impl Into<String>) -> Self {
        Self {
            mapping: mapping.into(),
            write_value: None,
        }
    }

    pub fn with_value(mapping: impl Into<String>, value: Value) -> Self {
        Self {
            mapping: mapping.into(),
            write_value: Some(value),
        }
    }
}

/// The outcome of one command.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommandResponse {
    pub mapping: String,
    pub result: StatusCode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CommandResponse {
    pub fn success(mapping: String, read_value: Option<Value>) -> Self {
        Self {
            mapping,
            result: StatusCode::Success,
            read_value,
            message: None,
        }
    }

    pub fn failure(mapping: String, result: StatusCode, message: String) -> Self {
        Self {
            mapping,
            result,
            read_value: None,
            message: Some(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_status_code_serializes_as_number() {
        let json = serde_json::to_value(StatusCode::DataWrongTypeOrEmpty).unwrap();
        assert_eq!(json, json!(13));

        let code: StatusCode = serde_json::from_value(json!(16)).unwrap();
        assert_eq!(code, StatusCode::GetAggregationResultFail);
    }

    #[test]
    fn test_unknown_status_code_rejected() {
        assert!(serde_json::from_value::<StatusCode>(json!(2)).is_err());
        assert!(serde_json::from_value::<StatusCode>(json!(99)).is_err());
    }

    #[test]
    fn test_request_shape() {
        let request = CommandRequest::with_value(
            "CreateDocument",
            json!({ "collection": "widgets", "data": { "name": "a" } }),
        );

        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["mapping"], "CreateDocument");
        assert_eq!(json["write_value"]["collection"], "widgets");

        let bare: CommandRequest =
            serde_json::from_value(json!({ "mapping": "CollectionList" })).unwrap();
        assert!(bare.write_value.is_none());
    }

    #[test]
    fn test_response_round_trip() {
        let response = CommandResponse::failure(
            "RemoveDocument".to_string(),
            StatusCode::RemoveDocumentFail,
            "Invalid document id".to_string(),
        );

        let json = serde_json::to_string(&response).unwrap();
        let parsed: CommandResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.result, StatusCode::RemoveDocumentFail);
        assert!(parsed.read_value.is_none());
    }
}
