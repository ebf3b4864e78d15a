//! Command dispatch
//!
//! Maps command names to store operations. Commands in a batch run in order,
//! each failure is captured into that command's status code, and no failure
//! aborts its siblings.

use std::sync::Arc;

use parking_lot::RwLock;
use serde_json::{Map, Value};

use crate::command::{CommandRequest, CommandResponse, StatusCode};
use crate::config::MongoConfig;
use crate::db::{DataAccess, SlotId};
use crate::error::BridgeResult;

/// Stateless request router over a swappable store adapter.
pub struct CommandDispatcher {
    data: RwLock<Arc<DataAccess>>,
    mongo_config: RwLock<MongoConfig>,
}

impl CommandDispatcher {
    pub async fn connect(config: MongoConfig) -> BridgeResult<Self> {
        let data = Arc::new(DataAccess::connect(&config).await?);
        Ok(Self {
            data: RwLock::new(data),
            mongo_config: RwLock::new(config),
        })
    }

    /// Rebuild the store adapter if the settings changed. In-flight commands
    /// keep the adapter they started with and complete against the old
    /// connection; nothing is drained or cancelled.
    pub async fn reconfigure(&self, config: MongoConfig) -> BridgeResult<bool> {
        if *self.mongo_config.read() == config {
            return Ok(false);
        }

        let data = Arc::new(DataAccess::connect(&config).await?);
        *self.data.write() = data;
        *self.mongo_config.write() = config;

        tracing::info!("store adapter rebuilt from new configuration");
        Ok(true)
    }

    /// Adapter snapshot for the duration of one command.
    fn data(&self) -> Arc<DataAccess> {
        self.data.read().clone()
    }

    pub async fn dispatch_batch(&self, commands: Vec<CommandRequest>) -> Vec<CommandResponse> {
        let mut responses = Vec::with_capacity(commands.len());
        for command in commands {
            responses.push(self.dispatch(command).await);
        }
        responses
    }

    pub async fn dispatch(&self, command: CommandRequest) -> CommandResponse {
        match command.mapping.as_str() {
            "CollectionList" => self.collection_list(command).await,
            "AggregationOutputList1" => self.aggregation_output(command, SlotId::One).await,
            "AggregationOutputList2" => self.aggregation_output(command, SlotId::Two).await,
            "AggregationOutputList3" => self.aggregation_output(command, SlotId::Three).await,
            "UpdateDocument" => self.update_document(command).await,
            "CreateDocument" => self.create_document(command).await,
            "RemoveDocument" => self.remove_document(command).await,
            "CreateCollection" => self.create_collection(command).await,
            "SetAggregationPipeline" => self.set_aggregation_pipeline(command).await,
            "GetAggregationResult" => self.get_aggregation_result(command).await,
            unknown => CommandResponse::failure(
                command.mapping.clone(),
                StatusCode::Fail,
                format!("Unknown command '{}' not handled", unknown),
            ),
        }
    }

    async fn collection_list(&self, command: CommandRequest) -> CommandResponse {
        match self.data().collection_list().await {
            Ok(entries) => CommandResponse::success(
                command.mapping,
                Some(serde_json::to_value(entries).unwrap_or(Value::Null)),
            ),
            Err(e) => CommandResponse::failure(command.mapping, StatusCode::Fail, e.to_string()),
        }
    }

    async fn aggregation_output(&self, command: CommandRequest, slot: SlotId) -> CommandResponse {
        match self.data().read_pipeline_result(slot).await {
            Ok(result) => CommandResponse::success(command.mapping, Some(Value::Array(result))),
            Err(e) => CommandResponse::failure(command.mapping, StatusCode::Fail, e.to_string()),
        }
    }

    async fn create_document(&self, command: CommandRequest) -> CommandResponse {
        let mut response = match document_payload(command.write_value.as_ref()) {
            Ok((collection, data)) => match self.data().create_document(collection, data).await {
                Ok(()) => CommandResponse::success(command.mapping.clone(), None),
                Err(e) => CommandResponse::failure(
                    command.mapping.clone(),
                    StatusCode::CreateDocumentFail,
                    e.to_string(),
                ),
            },
            Err(message) => wrong_payload(&command.mapping, message),
        };

        response.read_value = command.write_value;
        response
    }

    async fn update_document(&self, command: CommandRequest) -> CommandResponse {
        let mut response = match document_payload(command.write_value.as_ref()) {
            Ok((collection, data)) => match self.data().update_document(collection, data).await {
                Ok(()) => CommandResponse::success(command.mapping.clone(), None),
                Err(e) => CommandResponse::failure(
                    command.mapping.clone(),
                    StatusCode::UpdateDocumentFail,
                    e.to_string(),
                ),
            },
            Err(message) => wrong_payload(&command.mapping, message),
        };

        response.read_value = command.write_value;
        response
    }

    async fn remove_document(&self, command: CommandRequest) -> CommandResponse {
        let mut response = match remove_payload(command.write_value.as_ref()) {
            Ok((collection, id)) => match self.data().remove_document(collection, id).await {
                Ok(()) => CommandResponse::success(command.mapping.clone(), None),
                Err(e) => CommandResponse::failure(
                    command.mapping.clone(),
                    StatusCode::RemoveDocumentFail,
                    e.to_string(),
                ),
            },
            Err(message) => wrong_payload(&command.mapping, message),
        };

        response.read_value = command.write_value;
        response
    }

    async fn create_collection(&self, command: CommandRequest) -> CommandResponse {
        let mut response = match command.write_value.as_ref().and_then(Value::as_str) {
            Some(name) if !name.trim().is_empty() => {
                match self.data().create_collection(name).await {
                    Ok(()) => CommandResponse::success(command.mapping.clone(), None),
                    Err(e) => CommandResponse::failure(
                        command.mapping.clone(),
                        StatusCode::CreateCollectionFail,
                        e.to_string(),
                    ),
                }
            }
            _ => wrong_payload(&command.mapping, "Expected a non-empty collection name string"),
        };

        response.read_value = command.write_value;
        response
    }

    async fn set_aggregation_pipeline(&self, command: CommandRequest) -> CommandResponse {
        let mut response = match pipeline_payload(command.write_value.as_ref()) {
            Ok((collection, stages, pipeline_id)) => match SlotId::from_number(pipeline_id) {
                Some(slot) => match self.data().set_pipeline(slot, collection, stages).await {
                    Ok(()) => CommandResponse::success(command.mapping.clone(), None),
                    Err(e) => CommandResponse::failure(
                        command.mapping.clone(),
                        StatusCode::SetAggregationPipelineFail,
                        e.to_string(),
                    ),
                },
                None => CommandResponse::failure(
                    command.mapping.clone(),
                    StatusCode::SetAggregationPipelineFail,
                    format!("pipelineId must be 1, 2 or 3, got {}", pipeline_id),
                ),
            },
            Err(message) => wrong_payload(&command.mapping, message),
        };

        response.read_value = command.write_value;
        response
    }

    async fn get_aggregation_result(&self, command: CommandRequest) -> CommandResponse {
        match aggregation_payload(command.write_value.as_ref()) {
            Ok((collection, stages)) => {
                match self.data().run_aggregation(collection, stages).await {
                    Ok(result) => {
                        CommandResponse::success(command.mapping, Some(Value::Array(result)))
                    }
                    Err(e) => CommandResponse::failure(
                        command.mapping,
                        StatusCode::GetAggregationResultFail,
                        e.to_string(),
                    ),
                }
            }
            Err(message) => {
                let mut response = wrong_payload(&command.mapping, message);
                response.read_value = command.write_value;
                response
            }
        }
    }
}

fn wrong_payload(mapping: &str, message: impl Into<String>) -> CommandResponse {
    CommandResponse::failure(
        mapping.to_string(),
        StatusCode::DataWrongTypeOrEmpty,
        message.into(),
    )
}

fn struct_payload(write_value: Option<&Value>) -> Result<&Map<String, Value>, &'static str> {
    write_value
        .and_then(Value::as_object)
        .ok_or("Expected a structured payload")
}

fn collection_field<'a>(payload: &'a Map<String, Value>) -> Result<&'a str, &'static str> {
    payload
        .get("collection")
        .and_then(Value::as_str)
        .filter(|c| !c.trim().is_empty())
        .ok_or("Payload is missing a 'collection' string")
}

/// `{ collection: string, data: document }`
fn document_payload(write_value: Option<&Value>) -> Result<(&str, &Value), &'static str> {
    let payload = struct_payload(write_value)?;
    let collection = collection_field(payload)?;
    let data = payload
        .get("data")
        .filter(|d| d.is_object())
        .ok_or("Payload is missing a 'data' document")?;
    Ok((collection, data))
}

/// `{ collection: string, id: string }`
fn remove_payload(write_value: Option<&Value>) -> Result<(&str, &str), &'static str> {
    let payload = struct_payload(write_value)?;
    let collection = collection_field(payload)?;
    let id = payload
        .get("id")
        .and_then(Value::as_str)
        .ok_or("Payload is missing an 'id' string")?;
    Ok((collection, id))
}

/// Collection name for the aggregation paths, where blank or absent is not a
/// shape violation: a blank target yields an empty result (ad-hoc) or an
/// inert slot (set-pipeline) further down.
fn lenient_collection(payload: &Map<String, Value>) -> Result<&str, &'static str> {
    match payload.get("collection") {
        None | Some(Value::Null) => Ok(""),
        Some(Value::String(s)) => Ok(s.as_str()),
        Some(_) => Err("Payload 'collection' must be a string"),
    }
}

/// `{ collection: string, data: array of stage documents, pipelineId: 1|2|3 }`
fn pipeline_payload(write_value: Option<&Value>) -> Result<(&str, &Value, i64), &'static str> {
    let payload = struct_payload(write_value)?;
    let collection = lenient_collection(payload)?;
    let stages = payload
        .get("data")
        .filter(|d| d.is_array())
        .ok_or("Payload is missing a 'data' stage array")?;
    let pipeline_id = payload
        .get("pipelineId")
        .and_then(Value::as_i64)
        .ok_or("Payload is missing an integer 'pipelineId'")?;
    Ok((collection, stages, pipeline_id))
}

/// `{ collection: string, data: array of stage documents }`
fn aggregation_payload(write_value: Option<&Value>) -> Result<(&str, &Value), &'static str> {
    let payload = struct_payload(write_value)?;
    let collection = lenient_collection(payload)?;
    let stages = payload
        .get("data")
        .filter(|d| d.is_array())
        .ok_or("Payload is missing a 'data' stage array")?;
    Ok((collection, stages))
}
