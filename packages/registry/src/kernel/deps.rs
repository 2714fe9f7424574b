//! Shared dependency container wired at startup and in tests.

use std::sync::Arc;

use crate::kernel::events::ChangeBroadcaster;
use crate::kernel::nats::{NatsPublisher, TestNats};
use crate::kernel::retry::{RetryPolicy, TxRunner};
use crate::kernel::store::memory::MemoryStore;
use crate::kernel::store::Store;

/// Everything the services need.
#[derive(Clone)]
pub struct RegistryDeps {
    pub store: Arc<dyn Store>,
    pub publisher: Arc<dyn NatsPublisher>,
    pub runner: TxRunner,
}

impl RegistryDeps {
    pub fn new(
        store: Arc<dyn Store>,
        publisher: Arc<dyn NatsPublisher>,
        policy: RetryPolicy,
    ) -> Self {
        let runner = TxRunner::new(
            store.clone(),
            ChangeBroadcaster::new(publisher.clone()),
            policy,
        );
        Self {
            store,
            publisher,
            runner,
        }
    }

    /// In-memory deps for tests. Returns the concrete store and publisher so
    /// tests can inject faults and inspect published messages.
    pub fn test() -> (Self, MemoryStore, Arc<TestNats>) {
        let store = MemoryStore::new();
        let nats = Arc::new(TestNats::new());
        let deps = Self::new(
            Arc::new(store.clone()),
            nats.clone(),
            RetryPolicy {
                max_attempts: 3,
                initial_backoff: std::time::Duration::from_millis(1),
            },
        );
        (deps, store, nats)
    }
}
