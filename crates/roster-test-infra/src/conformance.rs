//! Conformance suite for [`Storer`] implementations.
//!
//! Every backend runs the same checks so that swapping the storage medium
//! never changes what a caller observes. Each check uses its own user and
//! entity IDs, so the whole suite can run against a single backend instance
//! (one container per backend is enough).
//!
//! ```ignore
//! #[tokio::test]
//! async fn memory_conformance() {
//!     let storer = Arc::new(InMemoryStorer::new());
//!     conformance::run_all(storer, EntityOrder::Insertion).await;
//! }
//! ```

use roster_core::{StorageError, Storer, UserEntity, ValidationError};
use std::sync::Arc;

/// Ordering a backend promises for [`Storer::get_entities`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityOrder {
    /// Entities come back in the order they were added.
    Insertion,
    /// No order is promised; results are compared as sets.
    Unspecified,
}

fn normalize(mut entity_ids: Vec<String>, order: EntityOrder) -> Vec<String> {
    if order == EntityOrder::Unspecified {
        entity_ids.sort();
    }
    entity_ids
}

/// Runs every check in this module against `storer`.
pub async fn run_all<S: Storer>(storer: Arc<S>, order: EntityOrder) {
    validation_rejects_empty_ids(storer.as_ref()).await;
    duplicate_add_conflicts(storer.as_ref()).await;
    reads_are_idempotent(storer.as_ref()).await;
    counts_match_reads(storer.as_ref(), order).await;
    unknown_keys_are_empty(storer.as_ref()).await;
    users_are_counted_per_entity(storer.as_ref()).await;
    end_to_end_scenario(storer.as_ref(), order).await;
    concurrent_distinct_adds(Arc::clone(&storer)).await;
}

/// Empty IDs fail with the matching validation error on every operation.
pub async fn validation_rejects_empty_ids<S: Storer>(storer: &S) {
    let err = storer.add_entity("", "conf-validation-e").await.unwrap_err();
    assert!(
        matches!(err, StorageError::Validation(ValidationError::EmptyUserId)),
        "add with empty user id: {err:?}"
    );

    let err = storer.add_entity("conf-validation-u", "").await.unwrap_err();
    assert!(
        matches!(err, StorageError::Validation(ValidationError::EmptyEntityId)),
        "add with empty entity id: {err:?}"
    );

    let err = storer.get_entities("").await.unwrap_err();
    assert!(
        matches!(err, StorageError::Validation(ValidationError::EmptyUserId)),
        "get with empty user id: {err:?}"
    );

    let err = storer.count_entities("").await.unwrap_err();
    assert!(
        matches!(err, StorageError::Validation(ValidationError::EmptyUserId)),
        "count entities with empty user id: {err:?}"
    );

    let err = storer.count_users("").await.unwrap_err();
    assert!(
        matches!(err, StorageError::Validation(ValidationError::EmptyEntityId)),
        "count users with empty entity id: {err:?}"
    );

    assert_eq!(storer.count_users("conf-validation-e").await.unwrap(), 0);
    assert_eq!(storer.count_entities("conf-validation-u").await.unwrap(), 0);
}

/// Adding the same pair twice succeeds once and then conflicts.
pub async fn duplicate_add_conflicts<S: Storer>(storer: &S) {
    storer
        .add_entity("conf-dup-u", "conf-dup-e")
        .await
        .expect("first add should succeed");

    let err = storer
        .add_entity("conf-dup-u", "conf-dup-e")
        .await
        .unwrap_err();
    match err {
        StorageError::AssociationExists { user_id, entity_id } => {
            assert_eq!(user_id, "conf-dup-u");
            assert_eq!(entity_id, "conf-dup-e");
        }
        other => panic!("expected AssociationExists, got {other:?}"),
    }

    assert_eq!(storer.count_entities("conf-dup-u").await.unwrap(), 1);
    assert_eq!(storer.count_users("conf-dup-e").await.unwrap(), 1);
}

/// Two reads with no write in between return the same entities.
pub async fn reads_are_idempotent<S: Storer>(storer: &S) {
    for entity_id in ["conf-idem-e1", "conf-idem-e2", "conf-idem-e3"] {
        storer.add_entity("conf-idem-u", entity_id).await.unwrap();
    }

    let first = storer.get_entities("conf-idem-u").await.unwrap();
    let second = storer.get_entities("conf-idem-u").await.unwrap();

    let mut first_sorted = first.clone();
    let mut second_sorted = second;
    first_sorted.sort();
    second_sorted.sort();
    assert_eq!(first_sorted, second_sorted);
    assert_eq!(first.len(), 3);
}

/// Counts agree with what `get_entities` returns.
pub async fn counts_match_reads<S: Storer>(storer: &S, order: EntityOrder) {
    storer.add_entity("conf-count-u", "conf-count-e1").await.unwrap();
    storer.add_entity("conf-count-u", "conf-count-e2").await.unwrap();

    assert_eq!(storer.count_entities("conf-count-u").await.unwrap(), 2);
    let entity_ids = storer.get_entities("conf-count-u").await.unwrap();
    assert_eq!(
        normalize(entity_ids, order),
        vec!["conf-count-e1", "conf-count-e2"]
    );
}

/// Unknown keys read as empty, never as errors.
pub async fn unknown_keys_are_empty<S: Storer>(storer: &S) {
    assert!(storer.get_entities("conf-nobody").await.unwrap().is_empty());
    assert_eq!(storer.count_entities("conf-nobody").await.unwrap(), 0);
    assert_eq!(storer.count_users("conf-nothing").await.unwrap(), 0);
}

/// `count_users` counts distinct users per entity, independent of other entities.
pub async fn users_are_counted_per_entity<S: Storer>(storer: &S) {
    for user in 0..5 {
        let user_id = format!("conf-fanin-u{user}");
        storer.add_entity(&user_id, "conf-fanin-e1").await.unwrap();
        if user % 2 == 0 {
            storer.add_entity(&user_id, "conf-fanin-e2").await.unwrap();
        }
    }

    assert_eq!(storer.count_users("conf-fanin-e1").await.unwrap(), 5);
    assert_eq!(storer.count_users("conf-fanin-e2").await.unwrap(), 3);
    assert_eq!(storer.count_entities("conf-fanin-u0").await.unwrap(), 2);
    assert_eq!(storer.count_entities("conf-fanin-u1").await.unwrap(), 1);
}

/// The reference add/add/add/get/count sequence.
pub async fn end_to_end_scenario<S: Storer>(storer: &S, order: EntityOrder) {
    storer.add_entity("User-0", "Entity-0").await.unwrap();

    let err = storer.add_entity("User-0", "Entity-0").await.unwrap_err();
    assert!(
        matches!(err, StorageError::AssociationExists { .. }),
        "duplicate add: {err:?}"
    );

    storer.add_entity("User-0", "Entity-1").await.unwrap();

    let entity_ids = storer.get_entities("User-0").await.unwrap();
    assert_eq!(normalize(entity_ids, order), vec!["Entity-0", "Entity-1"]);
    assert_eq!(storer.count_users("Entity-0").await.unwrap(), 1);
}

/// Concurrent adds of distinct pairs all land.
pub async fn concurrent_distinct_adds<S: Storer>(storer: Arc<S>) {
    let mut handles = Vec::new();
    for i in 0..8 {
        let storer = Arc::clone(&storer);
        handles.push(tokio::spawn(async move {
            storer
                .add_entity(&format!("conf-conc-u{i}"), "conf-conc-e")
                .await
        }));
    }

    for handle in handles {
        handle.await.expect("task panicked").expect("add should succeed");
    }

    assert_eq!(storer.count_users("conf-conc-e").await.unwrap(), 8);
}

/// The removed association [`readd_over_removed_association`] expects to find.
///
/// The `Storer` contract has no way to remove a pair, so each backend test
/// writes this record through its own medium before running the check.
pub fn removed_association() -> UserEntity {
    let mut record = UserEntity::new("conf-removed-u", "conf-removed-e");
    record.removed = true;
    record.removed_time = Some(record.modified_time);
    record
}

/// A removed association is invisible and does not block adding the pair again.
pub async fn readd_over_removed_association<S: Storer>(storer: &S) {
    let removed = removed_association();
    let (user_id, entity_id) = (removed.user_id.as_str(), removed.entity_id.as_str());

    assert!(storer.get_entities(user_id).await.unwrap().is_empty());
    assert_eq!(storer.count_entities(user_id).await.unwrap(), 0);
    assert_eq!(storer.count_users(entity_id).await.unwrap(), 0);

    storer
        .add_entity(user_id, entity_id)
        .await
        .expect("re-adding over a removed association should succeed");

    assert_eq!(storer.get_entities(user_id).await.unwrap(), vec![entity_id]);
    assert_eq!(storer.count_entities(user_id).await.unwrap(), 1);
    assert_eq!(storer.count_users(entity_id).await.unwrap(), 1);

    let err = storer.add_entity(user_id, entity_id).await.unwrap_err();
    assert!(
        matches!(err, StorageError::AssociationExists { .. }),
        "second add over a removed association: {err:?}"
    );
}
