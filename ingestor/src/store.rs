use std::time::Duration;

use async_trait::async_trait;
use mongodb::bson::{doc, Bson, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection};
use tracing::info;

use crate::errors::{Error, Result};

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub uri: String,
    pub database: String,
    pub collection: String,
    pub timeout: Duration,
}

/// Insert-only view of the collection readings are written to.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Inserts a new document and returns the id the store assigned to it.
    async fn insert(&self, document: Document) -> Result<String>;

    /// Deletes every document in the collection. Only used by the opt-in reset.
    async fn clear(&self) -> Result<u64>;
}

pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    /// One connection attempt, forced with a `ping` so an unreachable server
    /// fails here rather than on the first insert.
    pub async fn connect(settings: &StoreSettings) -> Result<Self> {
        let mut options = ClientOptions::parse(settings.uri.as_str())
            .await
            .map_err(Error::StoreConnect)?;
        options.server_selection_timeout = Some(settings.timeout);
        options.connect_timeout = Some(settings.timeout);
        options.app_name = Some("ingestor".to_string());

        let client = Client::with_options(options).map_err(Error::StoreConnect)?;
        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(Error::StoreConnect)?;

        info!(
            "Connected to MongoDB at {}, writing to {}.{}",
            redact(&settings.uri),
            settings.database,
            settings.collection
        );

        Ok(Self {
            collection: client
                .database(&settings.database)
                .collection(&settings.collection),
        })
    }
}

#[async_trait]
impl DocumentStore for MongoStore {
    async fn insert(&self, document: Document) -> Result<String> {
        let result = self
            .collection
            .insert_one(document)
            .await
            .map_err(Error::StoreWrite)?;

        Ok(match result.inserted_id {
            Bson::ObjectId(id) => id.to_hex(),
            other => other.to_string(),
        })
    }

    async fn clear(&self) -> Result<u64> {
        let result = self
            .collection
            .delete_many(doc! {})
            .await
            .map_err(Error::StoreWrite)?;
        Ok(result.deleted_count)
    }
}

/// Strips credentials from a connection string before it is logged.
pub fn redact(uri: &str) -> &str {
    match uri.rsplit_once('@') {
        Some((_, host)) => host,
        None => uri,
    }
}
