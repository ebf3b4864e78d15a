//! JSON/BSON conversion with identifier normalization
//!
//! Everything crossing the command boundary is JSON; everything stored is
//! BSON. The store's 12-byte ObjectId is round-tripped as its 24-character
//! hex string, and BSON types with no JSON counterpart degrade to their
//! string rendering rather than failing the whole document.

use mongodb::bson::oid::ObjectId;
use mongodb::bson::{Bson, Document};
use serde_json::{Map, Value};

use crate::error::{BridgeError, BridgeResult};

/// Field holding the store-generated identifier.
pub const ID_FIELD: &str = "_id";

/// Parse the canonical hex form of a document identifier.
pub fn parse_object_id(id: &str) -> BridgeResult<ObjectId> {
    ObjectId::parse_str(id)
        .map_err(|e| BridgeError::InvalidInput(format!("Invalid document id '{}': {}", id, e)))
}

/// Convert a JSON object into a BSON document. Non-object values are
/// rejected since the store only accepts documents at the top level.
pub fn value_to_document(value: &Value) -> BridgeResult<Document> {
    match value {
        Value::Object(map) => {
            let mut doc = Document::new();
            for (key, val) in map {
                doc.insert(key.clone(), json_to_bson(val));
            }
            Ok(doc)
        }
        other => Err(BridgeError::InvalidInput(format!(
            "Expected a JSON object, got {}",
            json_type_name(other)
        ))),
    }
}

/// Convert a JSON array into an ordered sequence of pipeline stage documents.
pub fn value_to_pipeline(value: &Value) -> BridgeResult<Vec<Document>> {
    match value {
        Value::Array(stages) => stages.iter().map(value_to_document).collect(),
        other => Err(BridgeError::InvalidInput(format!(
            "Expected a JSON array of pipeline stages, got {}",
            json_type_name(other)
        ))),
    }
}

pub fn document_to_value(doc: &Document) -> Value {
    let mut map = Map::new();
    for (key, val) in doc {
        map.insert(key.clone(), bson_to_json(val));
    }
    Value::Object(map)
}

fn json_to_bson(value: &Value) -> Bson {
    match value {
        Value::Null => Bson::Null,
        Value::Bool(b) => Bson::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Bson::Int64(i)
            } else {
                // as_f64 only fails for integers outside the i64/f64 ranges
                Bson::Double(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::String(s) => Bson::String(s.clone()),
        Value::Array(items) => Bson::Array(items.iter().map(json_to_bson).collect()),
        Value::Object(map) => {
            let mut doc = Document::new();
            for (key, val) in map {
                doc.insert(key.clone(), json_to_bson(val));
            }
            Bson::Document(doc)
        }
    }
}

fn bson_to_json(value: &Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(*b),
        Bson::Int32(i) => Value::from(*i),
        Bson::Int64(i) => Value::from(*i),
        Bson::Double(d) => serde_json::Number::from_f64(*d)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        Bson::String(s) => Value::String(s.clone()),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => Value::String(
            dt.try_to_rfc3339_string()
                .unwrap_or_else(|_| dt.to_string()),
        ),
        Bson::Array(items) => Value::Array(items.iter().map(bson_to_json).collect()),
        Bson::Document(doc) => document_to_value(doc),
        // Remaining BSON types have no JSON counterpart; degrade to a string
        other => Value::String(other.to_string()),
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
