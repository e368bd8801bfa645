use crate::error::Result;
use async_trait::async_trait;

/// Stores and retrieves user-entity associations.
///
/// Every backend upholds the same observable contract:
///
/// - empty IDs are rejected with a [`ValidationError`](crate::ValidationError)
///   before any I/O;
/// - at most one active association exists per `(user_id, entity_id)` pair,
///   and a duplicate add fails with
///   [`StorageError::AssociationExists`](crate::StorageError::AssociationExists);
/// - reads and counts only consider active (non-removed) associations.
///
/// Implementations must be safe to call concurrently.
#[async_trait]
pub trait Storer: Send + Sync + 'static {
    /// Associates `entity_id` with `user_id`.
    async fn add_entity(&self, user_id: &str, entity_id: &str) -> Result<()>;

    /// Returns the entity IDs associated with `user_id`.
    ///
    /// Returns an empty vector, not an error, when there are none. Ordering
    /// is backend-defined.
    async fn get_entities(&self, user_id: &str) -> Result<Vec<String>>;

    /// Counts the entities associated with `user_id`.
    async fn count_entities(&self, user_id: &str) -> Result<usize>;

    /// Counts the users associated with `entity_id`.
    async fn count_users(&self, entity_id: &str) -> Result<usize>;

    /// Releases backend resources. Called once at shutdown.
    async fn close(&self) -> Result<()>;
}
