pub mod deps;
pub mod events;
pub mod nats;
pub mod retry;
pub mod store;

pub use deps::RegistryDeps;
pub use events::{ChangeAction, ChangeBroadcaster, ChangeEvent, EntityKind};
pub use nats::{NatsClientPublisher, NatsPublisher, TestNats};
pub use retry::{RetryPolicy, TxRunner};
pub use store::{ConflictKind, IsolationLevel, Store, StoreError, StoreTx, Tx};
