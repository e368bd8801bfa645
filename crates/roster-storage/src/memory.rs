use async_trait::async_trait;
use parking_lot::Mutex;
use roster_core::{ensure_entity_id, ensure_user_id, Result, StorageError, Storer, UserEntity};
use tracing::debug;

/// In-memory implementation of the [`Storer`] trait.
///
/// Associations live in an append-only list behind a single mutex. Every
/// operation holds the lock for its whole body and scans the full list, so
/// calls are serialized and the existence check in [`Storer::add_entity`]
/// cannot race with another insert. Linear scans are fine at the sizes the
/// per-user and per-entity caps allow.
#[derive(Debug, Default)]
pub struct InMemoryStorer {
    user_entities: Mutex<Vec<UserEntity>>,
}

impl InMemoryStorer {
    /// Creates an empty in-memory storer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty in-memory storer with room for `capacity` associations.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            user_entities: Mutex::new(Vec::with_capacity(capacity)),
        }
    }

    /// Creates a storer holding `records` exactly as given, removed ones included.
    pub fn from_records(records: impl IntoIterator<Item = UserEntity>) -> Self {
        Self {
            user_entities: Mutex::new(records.into_iter().collect()),
        }
    }

    fn count(&self, predicate: impl Fn(&UserEntity) -> bool) -> usize {
        self.user_entities
            .lock()
            .iter()
            .filter(|&ue| ue.is_active() && predicate(ue))
            .count()
    }
}

#[async_trait]
impl Storer for InMemoryStorer {
    async fn add_entity(&self, user_id: &str, entity_id: &str) -> Result<()> {
        ensure_user_id(user_id)?;
        ensure_entity_id(entity_id)?;

        let mut user_entities = self.user_entities.lock();
        if user_entities.iter().any(|ue| ue.links(user_id, entity_id)) {
            return Err(StorageError::association_exists(user_id, entity_id));
        }
        user_entities.push(UserEntity::new(user_id, entity_id));

        debug!(user_id, entity_id, "storer added entity to user");
        Ok(())
    }

    async fn get_entities(&self, user_id: &str) -> Result<Vec<String>> {
        ensure_user_id(user_id)?;

        let entity_ids: Vec<String> = self
            .user_entities
            .lock()
            .iter()
            .filter(|ue| ue.is_active() && ue.user_id == user_id)
            .map(|ue| ue.entity_id.clone())
            .collect();

        debug!(
            user_id,
            n_entities = entity_ids.len(),
            "storer got entities for user"
        );
        Ok(entity_ids)
    }

    async fn count_entities(&self, user_id: &str) -> Result<usize> {
        ensure_user_id(user_id)?;
        let count = self.count(|ue| ue.user_id == user_id);
        debug!(user_id, count, "storer counted entities for user");
        Ok(count)
    }

    async fn count_users(&self, entity_id: &str) -> Result<usize> {
        ensure_entity_id(entity_id)?;
        let count = self.count(|ue| ue.entity_id == entity_id);
        debug!(entity_id, count, "storer counted users for entity");
        Ok(count)
    }

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::ValidationError;
    use std::sync::Arc;

    #[tokio::test]
    async fn add_and_get() {
        let storer = InMemoryStorer::new();

        storer.add_entity("User-0", "Entity-0").await.unwrap();
        storer.add_entity("User-0", "Entity-1").await.unwrap();
        storer.add_entity("User-1", "Entity-0").await.unwrap();

        assert_eq!(
            storer.get_entities("User-0").await.unwrap(),
            vec!["Entity-0", "Entity-1"]
        );
        assert_eq!(storer.get_entities("User-1").await.unwrap(), vec!["Entity-0"]);
    }

    #[tokio::test]
    async fn get_unknown_user_is_empty() {
        let storer = InMemoryStorer::new();

        assert!(storer.get_entities("nobody").await.unwrap().is_empty());
        assert_eq!(storer.count_entities("nobody").await.unwrap(), 0);
        assert_eq!(storer.count_users("nothing").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn duplicate_add_conflicts() {
        let storer = InMemoryStorer::new();

        storer.add_entity("u", "e").await.unwrap();
        let err = storer.add_entity("u", "e").await.unwrap_err();

        assert!(matches!(err, StorageError::AssociationExists { .. }));
        assert_eq!(storer.count_entities("u").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn counts_track_both_sides() {
        let storer = InMemoryStorer::new();

        storer.add_entity("u1", "e1").await.unwrap();
        storer.add_entity("u1", "e2").await.unwrap();
        storer.add_entity("u2", "e1").await.unwrap();

        assert_eq!(storer.count_entities("u1").await.unwrap(), 2);
        assert_eq!(storer.count_entities("u2").await.unwrap(), 1);
        assert_eq!(storer.count_users("e1").await.unwrap(), 2);
        assert_eq!(storer.count_users("e2").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn removed_records_are_invisible() {
        let storer = InMemoryStorer::new();
        let mut removed = UserEntity::new("u", "e");
        removed.removed = true;
        storer.user_entities.lock().push(removed);

        assert!(storer.get_entities("u").await.unwrap().is_empty());
        assert_eq!(storer.count_entities("u").await.unwrap(), 0);
        assert_eq!(storer.count_users("e").await.unwrap(), 0);

        // a removed association does not block re-adding the pair
        storer.add_entity("u", "e").await.unwrap();
        assert_eq!(storer.get_entities("u").await.unwrap(), vec!["e"]);
    }

    #[tokio::test]
    async fn preloaded_records_are_kept_as_given() {
        let mut removed = UserEntity::new("u", "e1");
        removed.removed = true;
        let storer = InMemoryStorer::from_records([removed, UserEntity::new("u", "e2")]);

        assert_eq!(storer.user_entities.lock().len(), 2);
        assert_eq!(storer.get_entities("u").await.unwrap(), vec!["e2"]);
    }

    #[tokio::test]
    async fn empty_ids_rejected() {
        let storer = InMemoryStorer::new();

        let err = storer.add_entity("", "e").await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation(ValidationError::EmptyUserId)
        ));
        let err = storer.add_entity("u", "").await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation(ValidationError::EmptyEntityId)
        ));
        let err = storer.count_users("").await.unwrap_err();
        assert!(matches!(
            err,
            StorageError::Validation(ValidationError::EmptyEntityId)
        ));
        assert!(storer.user_entities.lock().is_empty());
    }

    #[tokio::test]
    async fn concurrent_duplicate_adds_insert_once() {
        let storer = Arc::new(InMemoryStorer::new());
        let mut handles = vec![];

        for _ in 0..16 {
            let storer = Arc::clone(&storer);
            handles.push(tokio::spawn(async move {
                storer.add_entity("racer", "prize").await.is_ok()
            }));
        }

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap() {
                successes += 1;
            }
        }

        assert_eq!(successes, 1);
        assert_eq!(storer.count_users("prize").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_access() {
        let storer = Arc::new(InMemoryStorer::with_capacity(32));
        let mut handles = vec![];

        for i in 0..10u64 {
            let storer = Arc::clone(&storer);
            handles.push(tokio::spawn(async move {
                storer
                    .add_entity(&format!("user-{i:03}"), "shared")
                    .await
                    .unwrap();
            }));
        }

        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(storer.count_users("shared").await.unwrap(), 10);
        for i in 0..10u64 {
            let entities = storer.get_entities(&format!("user-{i:03}")).await.unwrap();
            assert_eq!(entities, vec!["shared"]);
        }
    }
}
