//! Post-commit change notifications.
//!
//! Mutations queue [`ChangeEvent`]s on the transaction while it is open; the
//! runner drains and publishes them only after the transaction commits, so
//! subscribers never observe a change that was rolled back.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::warn;
use uuid::Uuid;

use crate::kernel::nats::NatsPublisher;

/// The entity families that emit change notifications.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityKind {
    Settlement,
    Location,
    Steward,
}

impl EntityKind {
    /// The NATS subject this entity's changes are published to.
    pub fn subject(&self) -> &'static str {
        match self {
            EntityKind::Settlement => "registry.settlements",
            EntityKind::Location => "registry.locations",
            EntityKind::Steward => "registry.stewards",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeAction {
    Created,
    Updated,
    Deleted,
}

/// A single committed change, published as JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangeEvent {
    pub entity: EntityKind,
    pub action: ChangeAction,
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl ChangeEvent {
    pub fn created(entity: EntityKind, id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            entity,
            action: ChangeAction::Created,
            id,
            payload: Some(payload),
        }
    }

    pub fn updated(entity: EntityKind, id: Uuid, payload: serde_json::Value) -> Self {
        Self {
            entity,
            action: ChangeAction::Updated,
            id,
            payload: Some(payload),
        }
    }

    pub fn deleted(entity: EntityKind, id: Uuid) -> Self {
        Self {
            entity,
            action: ChangeAction::Deleted,
            id,
            payload: None,
        }
    }
}

/// Best-effort JSON payload for an event. Serialization of our own models
/// does not fail in practice; if it ever does, the event still goes out
/// with a null payload.
pub fn json_payload<T: Serialize>(value: &T) -> serde_json::Value {
    match serde_json::to_value(value) {
        Ok(v) => v,
        Err(e) => {
            warn!(error = %e, "failed to serialize event payload");
            serde_json::Value::Null
        }
    }
}

/// Publishes change events after commit.
///
/// Publish failures are logged and swallowed. The data change has already
/// committed by the time we get here, so a broker outage must not turn a
/// successful mutation into an error.
#[derive(Clone)]
pub struct ChangeBroadcaster {
    publisher: Arc<dyn NatsPublisher>,
}

impl ChangeBroadcaster {
    pub fn new(publisher: Arc<dyn NatsPublisher>) -> Self {
        Self { publisher }
    }

    pub async fn publish(&self, event: &ChangeEvent) {
        let subject = event.entity.subject().to_string();
        let payload = match serde_json::to_vec(event) {
            Ok(bytes) => Bytes::from(bytes),
            Err(e) => {
                warn!(error = %e, subject, "failed to serialize change event");
                return;
            }
        };
        if let Err(e) = self.publisher.publish(subject.clone(), payload).await {
            warn!(error = %e, subject, "failed to publish change event");
        }
    }

    pub async fn publish_all(&self, events: &[ChangeEvent]) {
        for event in events {
            self.publish(event).await;
        }
    }
}
