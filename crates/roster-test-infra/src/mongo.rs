use crate::container::{retry, ServiceContainer};
use crate::Result;
use mongodb::bson::{doc, DateTime, Document};
use mongodb::Client;
use roster_core::UserEntity;
use std::time::Duration;
use testcontainers::core::{IntoContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::GenericImage;
use typed_builder::TypedBuilder;

const MONGO_PORT: u16 = 27017;
const CONNECT_ATTEMPTS: usize = 20;
const CONNECT_DELAY: Duration = Duration::from_millis(500);

/// Collection the document-store backend keeps associations in.
pub const USER_ENTITY_COLLECTION: &str = "user_entity";

#[derive(TypedBuilder)]
pub struct MongoConfig {
    #[builder(default = "7".to_string())]
    tag: String,
    #[builder(default = "roster".to_string())]
    database: String,
}

/// Disposable, unauthenticated MongoDB server.
pub struct MongoServer {
    service: ServiceContainer,
    config: MongoConfig,
}

impl MongoServer {
    pub async fn new(config: MongoConfig) -> Result<Self> {
        let container = GenericImage::new("mongo", config.tag.as_str())
            .with_exposed_port(MONGO_PORT.tcp())
            .with_wait_for(WaitFor::message_on_stdout("Waiting for connections"))
            .start()
            .await?;

        Ok(Self {
            service: ServiceContainer::new(container, MONGO_PORT),
            config,
        })
    }

    pub async fn uri(&self) -> Result<String> {
        let (host, port) = self.service.address().await?;
        Ok(format!("mongodb://{host}:{port}"))
    }

    /// Name of the database tests should use.
    pub fn database(&self) -> &str {
        &self.config.database
    }

    /// Returns a client once the server answers a ping.
    pub async fn client(&self) -> Result<Client> {
        let uri = self.uri().await?;
        let uri = uri.as_str();
        let client = retry(CONNECT_ATTEMPTS, CONNECT_DELAY, || async move {
            let client = Client::with_uri_str(uri).await?;
            client.database("admin").run_command(doc! { "ping": 1 }).await?;
            Ok::<_, mongodb::error::Error>(client)
        })
        .await?;
        Ok(client)
    }

    /// Writes `record` into the association collection as-is, skipping every
    /// storer check.
    pub async fn insert_user_entity(&self, client: &Client, record: &UserEntity) -> Result<()> {
        client
            .database(self.database())
            .collection::<Document>(USER_ENTITY_COLLECTION)
            .insert_one(user_entity_document(record))
            .await?;
        Ok(())
    }
}

fn user_entity_document(record: &UserEntity) -> Document {
    doc! {
        "user_id": record.user_id.as_str(),
        "entity_id": record.entity_id.as_str(),
        "removed": record.removed,
        "modified_date": record.modified_date,
        "modified_time": DateTime::from_millis(record.modified_time.as_millisecond()),
        "added_time": DateTime::from_millis(record.added_time.as_millisecond()),
        "removed_time": record
            .removed_time
            .map(|ts| DateTime::from_millis(ts.as_millisecond())),
    }
}
