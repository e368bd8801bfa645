use std::sync::Arc;

use roster_storage::InMemoryStorer;
use roster_test_infra::conformance::{self, EntityOrder};

#[tokio::test]
async fn memory_storer_conformance() {
    conformance::run_all(Arc::new(InMemoryStorer::new()), EntityOrder::Insertion).await;
}

#[tokio::test]
async fn validation_rejects_empty_ids() {
    conformance::validation_rejects_empty_ids(&InMemoryStorer::new()).await;
}

#[tokio::test]
async fn end_to_end_scenario_preserves_insertion_order() {
    conformance::end_to_end_scenario(&InMemoryStorer::new(), EntityOrder::Insertion).await;
}

#[tokio::test]
async fn readd_over_removed_association() {
    let storer = InMemoryStorer::from_records([conformance::removed_association()]);
    conformance::readd_over_removed_association(&storer).await;
}
