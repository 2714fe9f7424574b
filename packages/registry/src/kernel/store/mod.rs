//! Storage abstraction over the registry's backing store.
//!
//! Services speak to the store through the [`Store`] / [`StoreTx`] traits so
//! the same transactional logic runs against Postgres in production and the
//! in-memory store in tests. Concurrency conflicts surface as typed
//! [`StoreError`] variants instead of backend-specific error codes.

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::ops::{Deref, DerefMut};
use thiserror::Error;

use crate::common::{
    ImportOperationId, LocationId, RegistryError, SettlementId, StewardId,
};
use crate::domains::imports::models::ImportOperation;
use crate::domains::locations::models::{Location, LocationInput};
use crate::domains::settlements::models::{NewSettlement, Settlement};
use crate::domains::stewards::models::{Steward, StewardInput};
use crate::kernel::events::ChangeEvent;

/// Transaction isolation requested at `begin`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadCommitted,
    Serializable,
}

/// Classification of a concurrency conflict raised by the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConflictKind {
    Serialization,
    Deadlock,
}

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("could not serialize access due to concurrent update")]
    Serialization,
    #[error("deadlock detected")]
    Deadlock,
    #[error("data integrity violation: {0}")]
    Integrity(String),
    #[error("store backend error: {0}")]
    Backend(#[from] anyhow::Error),
}

impl StoreError {
    pub fn conflict_kind(&self) -> Option<ConflictKind> {
        match self {
            StoreError::Serialization => Some(ConflictKind::Serialization),
            StoreError::Deadlock => Some(ConflictKind::Deadlock),
            _ => None,
        }
    }
}

impl From<StoreError> for RegistryError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Serialization => RegistryError::SerializationConflict { attempts: 1 },
            StoreError::Deadlock => RegistryError::Deadlock,
            StoreError::Integrity(msg) => RegistryError::IntegrityViolation(msg),
            StoreError::Backend(e) => RegistryError::Store(e.to_string()),
        }
    }
}

/// Handle to the backing store. Cheap to clone behind an `Arc`.
#[async_trait]
pub trait Store: Send + Sync {
    /// Open a transaction at the requested isolation level.
    async fn begin(&self, isolation: IsolationLevel) -> Result<Box<dyn StoreTx>, StoreError>;
}

/// An open transaction. All reads and writes inside a unit of work go through
/// one of these; nothing is visible to other transactions until `commit`.
#[async_trait]
pub trait StoreTx: Send {
    // -- settlements --

    /// Insert a settlement. The store assigns the id and creation date.
    async fn insert_settlement(&mut self, new: NewSettlement) -> Result<Settlement, StoreError>;
    async fn update_settlement(&mut self, settlement: &Settlement) -> Result<(), StoreError>;
    /// Returns false when no row with this id exists.
    async fn delete_settlement(&mut self, id: SettlementId) -> Result<bool, StoreError>;
    async fn find_settlement(&mut self, id: SettlementId)
        -> Result<Option<Settlement>, StoreError>;
    async fn all_settlements(&mut self) -> Result<Vec<Settlement>, StoreError>;
    /// Whether the name is already used, case-insensitively, by a settlement
    /// other than `exclude`.
    async fn settlement_name_taken(
        &mut self,
        name: &str,
        exclude: Option<SettlementId>,
    ) -> Result<bool, StoreError>;
    async fn count_settlements_by_location(
        &mut self,
        location_id: LocationId,
    ) -> Result<u64, StoreError>;
    async fn count_settlements_by_steward(
        &mut self,
        steward_id: StewardId,
    ) -> Result<u64, StoreError>;
    async fn settlement_ids_by_location(
        &mut self,
        location_id: LocationId,
    ) -> Result<Vec<SettlementId>, StoreError>;
    async fn settlement_ids_by_steward(
        &mut self,
        steward_id: StewardId,
    ) -> Result<Vec<SettlementId>, StoreError>;

    // -- locations --

    async fn insert_location(&mut self, input: &LocationInput) -> Result<Location, StoreError>;
    async fn update_location(&mut self, location: &Location) -> Result<(), StoreError>;
    async fn delete_location(&mut self, id: LocationId) -> Result<bool, StoreError>;
    async fn find_location(&mut self, id: LocationId) -> Result<Option<Location>, StoreError>;
    async fn all_locations(&mut self) -> Result<Vec<Location>, StoreError>;
    /// The id of an existing location at exactly these coordinates, other
    /// than `exclude`, if any.
    async fn location_at(
        &mut self,
        x: f32,
        y: f32,
        exclude: Option<LocationId>,
    ) -> Result<Option<LocationId>, StoreError>;

    // -- stewards --

    async fn insert_steward(&mut self, input: &StewardInput) -> Result<Steward, StoreError>;
    async fn update_steward(&mut self, steward: &Steward) -> Result<(), StoreError>;
    async fn delete_steward(&mut self, id: StewardId) -> Result<bool, StoreError>;
    async fn find_steward(&mut self, id: StewardId) -> Result<Option<Steward>, StoreError>;
    async fn all_stewards(&mut self) -> Result<Vec<Steward>, StoreError>;

    // -- import operations --

    /// Insert a new in-progress import operation stamped with the current time.
    async fn insert_import(&mut self) -> Result<ImportOperation, StoreError>;
    async fn update_import(&mut self, op: &ImportOperation) -> Result<(), StoreError>;
    async fn find_import(
        &mut self,
        id: ImportOperationId,
    ) -> Result<Option<ImportOperation>, StoreError>;
    async fn all_imports(&mut self) -> Result<Vec<ImportOperation>, StoreError>;

    // -- lifecycle --

    async fn commit(self: Box<Self>) -> Result<(), StoreError>;
    async fn rollback(self: Box<Self>) -> Result<(), StoreError>;
}

/// A store transaction plus the change events queued inside it.
///
/// Events are only handed back to the caller by [`Tx::commit`]; rolling back
/// discards them along with the data changes.
/// The `'env` lifetime carries an implied `'env: 'a` bound through the
/// `for<'a> Fn(&'a mut Tx<'env>) -> BoxFuture<'a, _>` closures in
/// [`crate::kernel::retry::TxRunner`], allowing work closures to borrow from
/// their environment.
pub struct Tx<'env> {
    inner: Box<dyn StoreTx>,
    events: Vec<ChangeEvent>,
    _env: std::marker::PhantomData<&'env ()>,
}

impl Tx<'_> {
    pub fn new(inner: Box<dyn StoreTx>) -> Self {
        Self {
            inner,
            events: Vec::new(),
            _env: std::marker::PhantomData,
        }
    }

    /// Queue a change event to publish if this transaction commits.
    pub fn queue_event(&mut self, event: ChangeEvent) {
        self.events.push(event);
    }

    pub async fn commit(self) -> Result<Vec<ChangeEvent>, StoreError> {
        self.inner.commit().await?;
        Ok(self.events)
    }

    pub async fn rollback(self) -> Result<(), StoreError> {
        self.inner.rollback().await
    }
}

impl Deref for Tx<'_> {
    type Target = dyn StoreTx;

    fn deref(&self) -> &Self::Target {
        self.inner.as_ref()
    }
}

impl DerefMut for Tx<'_> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner.as_mut()
    }
}
