//! Integration tests for the referential integrity guard and orphan
//! cleanup on settlement deletion.

mod common;

use crate::common::{harness, settlement_input, settlement_input_with_steward};
use registry_core::common::{RegistryError, RelationInput};
use registry_core::domains::settlements::service::OrphanFlags;

/// Direct delete of a referenced location is refused with the full set of
/// referencing settlement ids.
#[tokio::test]
async fn delete_referenced_location_is_blocked() {
    let ctx = harness();

    let first = ctx
        .settlements
        .create(settlement_input("Alpha", 1.0, 1.0))
        .await
        .unwrap();
    let mut second_input = settlement_input("Beta", 0.0, 0.0);
    second_input.location = RelationInput::ById(first.location.id);
    let second = ctx.settlements.create(second_input).await.unwrap();

    let err = ctx.locations.delete(first.location.id).await.unwrap_err();
    match err {
        RegistryError::DeletionBlocked {
            entity,
            usage_count,
            mut blocking_ids,
            ..
        } => {
            assert_eq!(entity, "Location");
            assert_eq!(usage_count, 2);
            blocking_ids.sort();
            let mut expected = vec![first.id, second.id];
            expected.sort();
            assert_eq!(blocking_ids, expected);
        }
        other => panic!("expected DeletionBlocked, got {other:?}"),
    }
}

/// Once nothing references the location, direct delete succeeds.
#[tokio::test]
async fn delete_unreferenced_location_succeeds() {
    let ctx = harness();

    let created = ctx
        .settlements
        .create(settlement_input("Alpha", 1.0, 1.0))
        .await
        .unwrap();
    ctx.settlements
        .delete(created.id, OrphanFlags::default())
        .await
        .unwrap();

    ctx.locations.delete(created.location.id).await.unwrap();
    assert!(matches!(
        ctx.locations.get(created.location.id).await,
        Err(RegistryError::NotFound { .. })
    ));
}

/// Direct delete of a referenced steward is refused the same way.
#[tokio::test]
async fn delete_referenced_steward_is_blocked() {
    let ctx = harness();

    let created = ctx
        .settlements
        .create(settlement_input_with_steward("Alpha", 1.0, 1.0, 1.7))
        .await
        .unwrap();
    let steward_id = created.steward.unwrap().id;

    let err = ctx.stewards.delete(steward_id).await.unwrap_err();
    match err {
        RegistryError::DeletionBlocked {
            entity,
            usage_count,
            blocking_ids,
            ..
        } => {
            assert_eq!(entity, "Steward");
            assert_eq!(usage_count, 1);
            assert_eq!(blocking_ids, vec![created.id]);
        }
        other => panic!("expected DeletionBlocked, got {other:?}"),
    }
}

/// Orphan cleanup removes the steward when the deleted settlement was its
/// only referrer.
#[tokio::test]
async fn orphan_cleanup_removes_unshared_steward() {
    let ctx = harness();

    let created = ctx
        .settlements
        .create(settlement_input_with_steward("Alpha", 1.0, 1.0, 1.7))
        .await
        .unwrap();
    let steward_id = created.steward.unwrap().id;

    ctx.settlements
        .delete(
            created.id,
            OrphanFlags {
                delete_location: true,
                delete_steward: true,
            },
        )
        .await
        .unwrap();

    assert!(matches!(
        ctx.stewards.get(steward_id).await,
        Err(RegistryError::NotFound { .. })
    ));
    assert!(matches!(
        ctx.locations.get(created.location.id).await,
        Err(RegistryError::NotFound { .. })
    ));
}

/// Orphan cleanup skips silently when another settlement still holds the
/// reference: no error, and the shared rows survive.
#[tokio::test]
async fn orphan_cleanup_skips_shared_rows() {
    let ctx = harness();

    let first = ctx
        .settlements
        .create(settlement_input_with_steward("Alpha", 1.0, 1.0, 1.7))
        .await
        .unwrap();
    let steward_id = first.steward.as_ref().unwrap().id;

    let mut second_input = settlement_input("Beta", 0.0, 0.0);
    second_input.location = RelationInput::ById(first.location.id);
    second_input.steward = RelationInput::ById(steward_id);
    ctx.settlements.create(second_input).await.unwrap();

    ctx.settlements
        .delete(
            first.id,
            OrphanFlags {
                delete_location: true,
                delete_steward: true,
            },
        )
        .await
        .unwrap();

    assert!(ctx.locations.get(first.location.id).await.is_ok());
    assert!(ctx.stewards.get(steward_id).await.is_ok());
}

/// Deletion events cover the settlement and any cleaned-up orphans.
#[tokio::test]
async fn orphan_cleanup_publishes_deletions() {
    let ctx = harness();

    let created = ctx
        .settlements
        .create(settlement_input_with_steward("Alpha", 1.0, 1.0, 1.7))
        .await
        .unwrap();
    ctx.nats.clear();

    ctx.settlements
        .delete(
            created.id,
            OrphanFlags {
                delete_location: true,
                delete_steward: true,
            },
        )
        .await
        .unwrap();

    assert_eq!(ctx.nats.publish_count(), 3);
    assert!(ctx.nats.was_published_to("registry.settlements"));
    assert!(ctx.nats.was_published_to("registry.locations"));
    assert!(ctx.nats.was_published_to("registry.stewards"));
}
