//! Store adapter: the operations behind the command table
//!
//! Owns the store handle and the three pipeline slots. Every method runs to
//! completion against the store before returning; there is no caching beyond
//! the per-slot last results.

use futures::TryStreamExt;
use mongodb::bson::{Document, doc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::MongoConfig;
use crate::db::codec;
use crate::db::pipeline::{PipelineSlot, SlotId};
use crate::db::store::StoreHandle;
use crate::error::{BridgeError, BridgeResult};

/// One collection's name together with all of its documents.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionEntry {
    pub name: String,
    pub documents: Vec<Value>,
}

/// Stateful data-access layer over one store handle.
///
/// Each pipeline slot has its own lock so concurrent reads of the same slot
/// serialize, while reads of different slots proceed independently.
pub struct DataAccess {
    store: StoreHandle,
    slots: [Mutex<PipelineSlot>; 3],
}

impl DataAccess {
    pub async fn connect(config: &MongoConfig) -> BridgeResult<Self> {
        let store = StoreHandle::connect(config).await?;
        Ok(Self {
            store,
            slots: [
                Mutex::new(PipelineSlot::default()),
                Mutex::new(PipelineSlot::default()),
                Mutex::new(PipelineSlot::default()),
            ],
        })
    }

    /// Enumerate every collection in the database together with all of its
    /// documents. A fetch failure anywhere fails the whole listing.
    pub async fn collection_list(&self) -> BridgeResult<Vec<CollectionEntry>> {
        let names = self
            .store
            .database
            .list_collection_names()
            .await
            .map_err(|e| BridgeError::CollectionList(e.to_string()))?;

        let mut entries = Vec::with_capacity(names.len());
        for name in names {
            let cursor = self
                .store
                .collection(&name)
                .find(doc! {})
                .await
                .map_err(|e| BridgeError::CollectionList(e.to_string()))?;
            let documents: Vec<Document> = cursor
                .try_collect()
                .await
                .map_err(|e| BridgeError::CollectionList(e.to_string()))?;

            entries.push(CollectionEntry {
                name,
                documents: documents.iter().map(codec::document_to_value).collect(),
            });
        }

        Ok(entries)
    }

    /// Insert one document. The collection is created implicitly if absent
    /// and the store assigns an identifier when the payload carries none.
    pub async fn create_document(&self, collection: &str, data: &Value) -> BridgeResult<()> {
        let document = codec::value_to_document(data)
            .map_err(|e| BridgeError::CreateDocument(e.to_string()))?;

        self.store
            .collection(collection)
            .insert_one(document)
            .await
            .map_err(|e| BridgeError::CreateDocument(e.to_string()))?;

        Ok(())
    }

    /// Merge-update one document matched by the identifier carried in the
    /// payload. The identifier is stripped from the update body first since
    /// the store rejects identifier mutation.
    pub async fn update_document(&self, collection: &str, data: &Value) -> BridgeResult<()> {
        let mut document = codec::value_to_document(data)
            .map_err(|e| BridgeError::UpdateDocument(e.to_string()))?;

        let id = document
            .remove(codec::ID_FIELD)
            .and_then(|b| b.as_str().map(str::to_owned))
            .ok_or_else(|| {
                BridgeError::UpdateDocument(format!(
                    "Payload is missing a string '{}' field",
                    codec::ID_FIELD
                ))
            })?;
        let id = codec::parse_object_id(&id)
            .map_err(|e| BridgeError::UpdateDocument(e.to_string()))?;

        self.store
            .collection(collection)
            .update_one(doc! { "_id": id }, doc! { "$set": document })
            .await
            .map_err(|e| BridgeError::UpdateDocument(e.to_string()))?;

        Ok(())
    }

    /// Delete the document matching `id`. Matching nothing is not an error.
    pub async fn remove_document(&self, collection: &str, id: &str) -> BridgeResult<()> {
        let id =
            codec::parse_object_id(id).map_err(|e| BridgeError::RemoveDocument(e.to_string()))?;

        self.store
            .collection(collection)
            .delete_one(doc! { "_id": id })
            .await
            .map_err(|e| BridgeError::RemoveDocument(e.to_string()))?;

        Ok(())
    }

    pub async fn create_collection(&self, name: &str) -> BridgeResult<()> {
        self.store
            .database
            .create_collection(name)
            .await
            .map_err(|e| BridgeError::CreateCollection(e.to_string()))?;

        Ok(())
    }

    /// Replace one slot's target collection and stage sequence together. The
    /// slot is cleared before parsing so a malformed pipeline leaves it
    /// inert instead of half-updated.
    pub async fn set_pipeline(
        &self,
        slot_id: SlotId,
        collection: &str,
        stages: &Value,
    ) -> BridgeResult<()> {
        let mut slot = self.slots[slot_id.index()].lock().await;
        slot.clear();

        let stages =
            codec::value_to_pipeline(stages).map_err(|e| BridgeError::SetPipeline(e.to_string()))?;
        slot.configure(collection.to_string(), stages);

        tracing::debug!(slot = slot_id.number(), collection, "pipeline configured");
        Ok(())
    }

    /// Re-execute the slot's pipeline and return the fresh result, or the
    /// cached one when the slot is not fully configured. On an execution
    /// failure the cached result is left untouched and the error propagates.
    pub async fn read_pipeline_result(&self, slot_id: SlotId) -> BridgeResult<Vec<Value>> {
        let mut slot = self.slots[slot_id.index()].lock().await;

        if let Some((collection, stages)) = slot.ready_config() {
            let collection = collection.to_string();
            let stages = stages.to_vec();

            let result = self.execute_pipeline(&collection, stages).await?;
            slot.store_result(result);
        }

        Ok(slot.last_result().iter().map(codec::document_to_value).collect())
    }

    /// One-shot aggregation without touching the slot cache. A blank
    /// collection or empty stage list yields an empty result, not an error.
    pub async fn run_aggregation(&self, collection: &str, stages: &Value) -> BridgeResult<Vec<Value>> {
        let stages =
            codec::value_to_pipeline(stages).map_err(|e| BridgeError::Aggregation(e.to_string()))?;

        if collection.trim().is_empty() || stages.is_empty() {
            return Ok(Vec::new());
        }

        let result = self
            .execute_pipeline(collection, stages)
            .await
            .map_err(|e| BridgeError::Aggregation(e.to_string()))?;

        Ok(result.iter().map(codec::document_to_value).collect())
    }

    async fn execute_pipeline(
        &self,
        collection: &str,
        stages: Vec<Document>,
    ) -> BridgeResult<Vec<Document>> {
        let cursor = self
            .store
            .collection(collection)
            .aggregate(stages)
            .await
            .map_err(|e| BridgeError::Aggregation(e.to_string()))?;

        cursor
            .try_collect()
            .await
            .map_err(|e| BridgeError::Aggregation(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // Client construction parses the URI without opening connections, so
    // everything up to the first store call is testable offline.
    async fn offline_adapter() -> DataAccess {
        DataAccess::connect(&MongoConfig::default()).await.unwrap()
    }

    #[tokio::test]
    async fn test_bad_uri_rejected() {
        let config = MongoConfig {
            connection_string: "not-a-mongodb-uri".to_string(),
            database_name: "hmi".to_string(),
        };
        assert!(matches!(
            DataAccess::connect(&config).await,
            Err(BridgeError::Connection(_))
        ));
    }

    #[tokio::test]
    async fn test_remove_document_malformed_id() {
        let adapter = offline_adapter().await;
        let err = adapter.remove_document("orders", "nope").await.unwrap_err();
        assert!(matches!(err, BridgeError::RemoveDocument(_)));
    }

    #[tokio::test]
    async fn test_update_document_requires_id() {
        let adapter = offline_adapter().await;

        let err = adapter
            .update_document("orders", &json!({ "status": "open" }))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UpdateDocument(_)));

        let err = adapter
            .update_document("orders", &json!({ "_id": "short", "status": "open" }))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::UpdateDocument(_)));
    }

    #[tokio::test]
    async fn test_create_document_rejects_non_object() {
        let adapter = offline_adapter().await;
        let err = adapter
            .create_document("orders", &json!([1, 2]))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::CreateDocument(_)));
    }

    #[tokio::test]
    async fn test_set_pipeline_parse_failure_leaves_slot_inert() {
        let adapter = offline_adapter().await;

        adapter
            .set_pipeline(SlotId::One, "orders", &json!([{ "$match": {} }]))
            .await
            .unwrap();

        // A later bad update clears the slot rather than half-applying
        let err = adapter
            .set_pipeline(SlotId::One, "orders", &json!("not stages"))
            .await
            .unwrap_err();
        assert!(matches!(err, BridgeError::SetPipeline(_)));

        let slot = adapter.slots[SlotId::One.index()].lock().await;
        assert!(!slot.is_ready());
    }

    #[tokio::test]
    async fn test_unready_slot_returns_cached_without_store_access() {
        let adapter = offline_adapter().await;

        // Never configured: read succeeds with an empty result and no store
        // round-trip (a round-trip would hang against the unreachable URI).
        let result = adapter.read_pipeline_result(SlotId::Two).await.unwrap();
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_slot_independence() {
        let adapter = offline_adapter().await;

        adapter
            .set_pipeline(SlotId::Two, "orders", &json!([{ "$match": {} }]))
            .await
            .unwrap();

        for other in [SlotId::One, SlotId::Three] {
            let slot = adapter.slots[other.index()].lock().await;
            assert!(!slot.is_ready());
            assert!(slot.last_result().is_empty());
        }
    }

    #[tokio::test]
    async fn test_run_aggregation_empty_inputs_yield_empty() {
        let adapter = offline_adapter().await;

        let result = adapter.run_aggregation("", &json!([{ "$match": {} }])).await.unwrap();
        assert!(result.is_empty());

        let result = adapter.run_aggregation("orders", &json!([])).await.unwrap();
        assert!(result.is_empty());
    }
}
