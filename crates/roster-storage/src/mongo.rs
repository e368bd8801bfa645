use crate::timeout::with_timeout;
use async_trait::async_trait;
use mongodb::bson::oid::ObjectId;
use mongodb::bson::{doc, DateTime, Document};
use mongodb::error::{ErrorKind, WriteFailure};
use mongodb::options::IndexOptions;
use mongodb::{Client, Collection, IndexModel};
use roster_core::{
    ensure_entity_id, ensure_user_id, Result, StorageBackend, StorageError, StorageParameters,
    Storer, UserEntity,
};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Collection holding one document per association.
pub const USER_ENTITY_COLLECTION: &str = "user_entity";

const UNIQUE_INDEX_NAME: &str = "user_entity_active_unique";
const DUPLICATE_KEY_CODE: i32 = 11000;

/// The persisted shape of a [`UserEntity`].
#[derive(Debug, Clone, Serialize, Deserialize)]
struct UserEntityDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    user_id: String,
    entity_id: String,
    removed: bool,
    modified_date: i32,
    modified_time: DateTime,
    added_time: DateTime,
    removed_time: Option<DateTime>,
}

impl From<UserEntity> for UserEntityDocument {
    fn from(ue: UserEntity) -> Self {
        Self {
            id: None,
            user_id: ue.user_id,
            entity_id: ue.entity_id,
            removed: ue.removed,
            modified_date: ue.modified_date,
            modified_time: DateTime::from_millis(ue.modified_time.as_millisecond()),
            added_time: DateTime::from_millis(ue.added_time.as_millisecond()),
            removed_time: ue
                .removed_time
                .map(|ts| DateTime::from_millis(ts.as_millisecond())),
        }
    }
}

/// MongoDB implementation of the [`Storer`] contract.
///
/// Each association is a document in the `user_entity` collection with a
/// server-generated `_id`. Result order of [`Storer::get_entities`] is not
/// guaranteed.
///
/// `add_entity` runs its own existence count before inserting. A unique
/// partial index over active `(user_id, entity_id)` pairs backs that check,
/// and a duplicate-key rejection is reported as
/// [`StorageError::AssociationExists`].
#[derive(Debug, Clone)]
pub struct MongoStorer {
    client: Client,
    collection: Collection<UserEntityDocument>,
    params: StorageParameters,
}

impl MongoStorer {
    /// Creates a storer over `database` using an existing client.
    pub fn new(client: Client, database: &str, params: StorageParameters) -> Self {
        let collection = client
            .database(database)
            .collection::<UserEntityDocument>(USER_ENTITY_COLLECTION);
        Self {
            client,
            collection,
            params,
        }
    }

    /// Connects to the deployment at `uri` and prepares the collection.
    ///
    /// Fails with [`StorageError::Configuration`] before connecting if the
    /// URI or database name is empty, or `params` selects a different backend.
    pub async fn connect(uri: &str, database: &str, params: StorageParameters) -> Result<Self> {
        if uri.is_empty() {
            return Err(StorageError::Configuration("empty MongoDB URI".to_string()));
        }
        if database.is_empty() {
            return Err(StorageError::Configuration(
                "empty MongoDB database name".to_string(),
            ));
        }
        if params.backend != StorageBackend::Mongo {
            return Err(StorageError::Configuration(format!(
                "unexpected storage type: {}",
                params.backend
            )));
        }

        let client = Client::with_uri_str(uri).await.map_err(map_mongo_error)?;
        let storer = Self::new(client, database, params);
        storer.ensure_indexes().await?;
        Ok(storer)
    }

    /// Creates the unique index over active associations if it is missing.
    pub async fn ensure_indexes(&self) -> Result<()> {
        let options = IndexOptions::builder()
            .name(UNIQUE_INDEX_NAME.to_string())
            .unique(true)
            .partial_filter_expression(doc! { "removed": false })
            .build();
        let index = IndexModel::builder()
            .keys(doc! { "user_id": 1, "entity_id": 1 })
            .options(options)
            .build();

        self.collection
            .create_index(index)
            .await
            .map_err(map_mongo_error)?;
        Ok(())
    }

    async fn count(&self, operation: &'static str, filter: Document) -> Result<usize> {
        let count = with_timeout(operation, self.params.count_query_timeout, async {
            self.collection
                .count_documents(filter)
                .await
                .map_err(map_mongo_error)
        })
        .await?;

        usize::try_from(count)
            .map_err(|_| StorageError::InvalidData(format!("count out of range: {count}")))
    }
}

fn entities_filter(user_id: &str) -> Document {
    doc! { "user_id": user_id, "removed": false }
}

fn users_filter(entity_id: &str) -> Document {
    doc! { "entity_id": entity_id, "removed": false }
}

fn is_duplicate_key(err: &mongodb::error::Error) -> bool {
    matches!(
        err.kind.as_ref(),
        ErrorKind::Write(WriteFailure::WriteError(write_error))
            if write_error.code == DUPLICATE_KEY_CODE
    )
}

fn map_mongo_error(err: mongodb::error::Error) -> StorageError {
    let message = err.to_string();

    match err.kind.as_ref() {
        ErrorKind::Io(_)
        | ErrorKind::ServerSelection { .. }
        | ErrorKind::ConnectionPoolCleared { .. } => StorageError::Unavailable(message),
        ErrorKind::BsonDeserialization(_) | ErrorKind::BsonSerialization(_) => {
            StorageError::InvalidData(message)
        }
        ErrorKind::InvalidArgument { .. } => StorageError::Configuration(message),
        _ => StorageError::Query(message),
    }
}

#[async_trait]
impl Storer for MongoStorer {
    async fn add_entity(&self, user_id: &str, entity_id: &str) -> Result<()> {
        ensure_user_id(user_id)?;
        ensure_entity_id(entity_id)?;

        let mut existing = entities_filter(user_id);
        existing.insert("entity_id", entity_id);
        let n = self.count("count user entities", existing).await?;
        debug!(user_id, entity_id, count = n, "storer counted user entities");
        if n > 0 {
            return Err(StorageError::association_exists(user_id, entity_id));
        }

        let document = UserEntityDocument::from(UserEntity::new(user_id, entity_id));
        with_timeout("add entity", self.params.add_query_timeout, async {
            match self.collection.insert_one(&document).await {
                Ok(_) => Ok(()),
                Err(err) if is_duplicate_key(&err) => {
                    Err(StorageError::association_exists(user_id, entity_id))
                }
                Err(err) => Err(map_mongo_error(err)),
            }
        })
        .await?;

        debug!(user_id, entity_id, "storer added entity to user");
        Ok(())
    }

    async fn get_entities(&self, user_id: &str) -> Result<Vec<String>> {
        ensure_user_id(user_id)?;

        let entity_ids = with_timeout("get entities", self.params.get_query_timeout, async {
            let mut cursor = self
                .collection
                .find(entities_filter(user_id))
                .await
                .map_err(map_mongo_error)?;

            let mut entity_ids = Vec::new();
            while cursor.advance().await.map_err(map_mongo_error)? {
                let document = cursor.deserialize_current().map_err(map_mongo_error)?;
                entity_ids.push(document.entity_id);
            }
            Ok(entity_ids)
        })
        .await?;

        debug!(
            user_id,
            n_entities = entity_ids.len(),
            "storer got entities for user"
        );
        Ok(entity_ids)
    }

    async fn count_entities(&self, user_id: &str) -> Result<usize> {
        ensure_user_id(user_id)?;
        let count = self
            .count("count entities", entities_filter(user_id))
            .await?;
        debug!(user_id, count, "storer counted entities for user");
        Ok(count)
    }

    async fn count_users(&self, entity_id: &str) -> Result<usize> {
        ensure_entity_id(entity_id)?;
        let count = self.count("count users", users_filter(entity_id)).await?;
        debug!(entity_id, count, "storer counted users for entity");
        Ok(count)
    }

    async fn close(&self) -> Result<()> {
        self.client.clone().shutdown().await;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jiff::Timestamp;

    #[test]
    fn document_carries_every_record_field() {
        let now = Timestamp::from_millisecond(1_700_000_000_123).unwrap();
        let document = UserEntityDocument::from(UserEntity::added_at("u", "e", now));

        assert_eq!(document.id, None);
        assert_eq!(document.user_id, "u");
        assert_eq!(document.entity_id, "e");
        assert!(!document.removed);
        assert_eq!(document.modified_date, 19_675);
        assert_eq!(document.added_time.timestamp_millis(), 1_700_000_000_123);
        assert_eq!(document.modified_time, document.added_time);
        assert_eq!(document.removed_time, None);
    }

    #[test]
    fn unsaved_document_omits_id() {
        let document = UserEntityDocument::from(UserEntity::new("u", "e"));
        let bson = mongodb::bson::to_document(&document).unwrap();

        assert!(!bson.contains_key("_id"));
        for field in [
            "user_id",
            "entity_id",
            "removed",
            "modified_date",
            "modified_time",
            "added_time",
            "removed_time",
        ] {
            assert!(bson.contains_key(field), "missing field {field}");
        }
    }

    #[test]
    fn filters_only_match_active_records() {
        assert_eq!(
            entities_filter("u"),
            doc! { "user_id": "u", "removed": false }
        );
        assert_eq!(
            users_filter("e"),
            doc! { "entity_id": "e", "removed": false }
        );
    }

    #[tokio::test]
    async fn connect_rejects_empty_settings() {
        let params = StorageParameters::builder()
            .backend(StorageBackend::Mongo)
            .build();

        let err = MongoStorer::connect("", "roster", params.clone())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));

        let err = MongoStorer::connect("mongodb://localhost:27017", "", params)
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }

    #[tokio::test]
    async fn connect_rejects_other_backend() {
        let err = MongoStorer::connect(
            "mongodb://localhost:27017",
            "roster",
            StorageParameters::default(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, StorageError::Configuration(_)));
    }
}
