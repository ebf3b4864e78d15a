//! MongoDB connection handle

use mongodb::{Client, Database};

use crate::config::MongoConfig;
use crate::error::{BridgeError, BridgeResult};

/// One client connection plus one selected logical database.
///
/// Built fresh on every configuration change; the previous handle is simply
/// dropped and in-flight operations complete against it.
pub struct StoreHandle {
    pub client: Client,
    pub database: Database,
}

impl StoreHandle {
    /// Parse the connection string and select the database. The driver opens
    /// actual connections lazily, so this only fails on a malformed URI.
    pub async fn connect(config: &MongoConfig) -> BridgeResult<Self> {
        let client = Client::with_uri_str(&config.connection_string)
            .await
            .map_err(|e| BridgeError::Connection(e.to_string()))?;
        let database = client.database(&config.database_name);

        tracing::info!(database = %config.database_name, "store handle created");

        Ok(Self { client, database })
    }

    pub fn collection(&self, name: &str) -> mongodb::Collection<mongodb::bson::Document> {
        self.database.collection(name)
    }
}
