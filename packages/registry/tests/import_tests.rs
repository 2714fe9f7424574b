//! Integration tests for the bulk-import orchestrator and its ledger.

mod common;

use crate::common::{first_page, harness, settlement_input};
use registry_core::common::{RegistryError, RelationInput};
use registry_core::domains::imports::models::ImportStatus;
use registry_core::kernel::store::ConflictKind;

/// A valid batch imports atomically and the ledger records success with
/// the created count.
#[tokio::test]
async fn successful_import_records_success() {
    let ctx = harness();

    let batch = vec![
        settlement_input("Alpha", 1.0, 0.0),
        settlement_input("Beta", 2.0, 0.0),
        settlement_input("Gamma", 3.0, 0.0),
    ];
    let result = ctx.imports.import(batch).await.unwrap();

    assert_eq!(result.created_count, 3);
    assert_eq!(result.created_ids.len(), 3);
    assert_eq!(ctx.settlements.list().await.unwrap().len(), 3);

    let op = ctx.imports.ledger().get(result.operation_id).await.unwrap();
    assert_eq!(op.status, ImportStatus::Success);
    assert_eq!(op.added_count, Some(3));
    assert!(op.finished_at.is_some());
}

/// Validation covers the whole batch first: one bad item rejects the
/// import with zero settlements created, and every violation carries the
/// index of the offending item.
#[tokio::test]
async fn invalid_item_rejects_whole_batch() {
    let ctx = harness();

    let mut batch = vec![
        settlement_input("Alpha", 1.0, 0.0),
        settlement_input("Beta", 2.0, 0.0),
        settlement_input("Gamma", 3.0, 0.0),
        settlement_input("Delta", 4.0, 0.0),
        settlement_input("Epsilon", 5.0, 0.0),
    ];
    batch[3].name = "   ".to_string();
    batch[3].area = -5;

    let err = ctx.imports.import(batch).await.unwrap_err();
    match err {
        RegistryError::ImportValidationFailed { items } => {
            assert_eq!(items.len(), 2);
            assert!(items.iter().all(|item| item.index == 3));
        }
        other => panic!("expected ImportValidationFailed, got {other:?}"),
    }

    assert!(ctx.settlements.list().await.unwrap().is_empty());
    assert_eq!(ctx.nats.publish_count(), 0);
}

/// A mid-batch business failure rolls back every creation and the ledger
/// shows failed.
#[tokio::test]
async fn mid_batch_failure_rolls_back_everything() {
    let ctx = harness();

    // Item 2 duplicates item 0's name, which only the transaction catches.
    let batch = vec![
        settlement_input("Alpha", 1.0, 0.0),
        settlement_input("Beta", 2.0, 0.0),
        settlement_input("ALPHA", 3.0, 0.0),
    ];
    let err = ctx.imports.import(batch).await.unwrap_err();
    assert!(matches!(err, RegistryError::BusinessRuleViolation { .. }));

    assert!(ctx.settlements.list().await.unwrap().is_empty());
    assert_eq!(ctx.nats.publish_count(), 0);

    let history = ctx.imports.ledger().page(first_page()).await.unwrap();
    assert_eq!(history.items.len(), 1);
    assert_eq!(history.items[0].status, ImportStatus::Failed);
    assert!(history.items[0].error_message.is_some());
}

/// When every import attempt conflicts, nothing is created and the ledger
/// entry still records the failure.
#[tokio::test]
async fn exhausted_conflicts_leave_failed_ledger_entry() {
    let ctx = harness();

    // The ledger's start() commit runs first and must succeed; the three
    // serializable import attempts after it all conflict.
    ctx.store.pass_next_commits(1);
    ctx.store.fail_next_commits(ConflictKind::Serialization, 3);

    let err = ctx
        .imports
        .import(vec![settlement_input("Alpha", 1.0, 0.0)])
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RegistryError::SerializationConflict { attempts: 3 }
    ));

    assert!(ctx.settlements.list().await.unwrap().is_empty());
    let history = ctx.imports.ledger().page(first_page()).await.unwrap();
    assert_eq!(history.items.len(), 1);
    assert_eq!(history.items[0].status, ImportStatus::Failed);
}

/// An empty batch is rejected before a ledger entry is opened.
#[tokio::test]
async fn empty_batch_is_rejected_without_ledger_entry() {
    let ctx = harness();

    let err = ctx.imports.import(Vec::new()).await.unwrap_err();
    assert!(matches!(err, RegistryError::InvalidArgument(_)));

    let history = ctx.imports.ledger().page(first_page()).await.unwrap();
    assert!(history.items.is_empty());
}

/// Reference/embed exclusivity is enforced per item during batch
/// validation.
#[tokio::test]
async fn missing_location_is_a_validation_item() {
    let ctx = harness();

    let mut batch = vec![settlement_input("Alpha", 1.0, 0.0)];
    batch[0].location = RelationInput::Absent;

    let err = ctx.imports.import(batch).await.unwrap_err();
    match err {
        RegistryError::ImportValidationFailed { items } => {
            assert_eq!(items.len(), 1);
            assert_eq!(items[0].index, 0);
            assert_eq!(items[0].field, "location");
        }
        other => panic!("expected ImportValidationFailed, got {other:?}"),
    }
}

/// Ledger history pages most recent first.
#[tokio::test]
async fn ledger_history_is_most_recent_first() {
    let ctx = harness();

    ctx.imports
        .import(vec![settlement_input("Alpha", 1.0, 0.0)])
        .await
        .unwrap();
    ctx.imports
        .import(vec![settlement_input("Beta", 2.0, 0.0)])
        .await
        .unwrap();

    let history = ctx.imports.ledger().page(first_page()).await.unwrap();
    assert_eq!(history.items.len(), 2);
    assert!(history.items[0].started_at >= history.items[1].started_at);
}
