//! In-memory store used by tests.
//!
//! Transactions clone the shared state, mutate the clone, and write it back
//! on commit. A tokio mutex serializes transactions so a committed snapshot
//! never clobbers a concurrent writer, which makes the store behave like a
//! serializable database for test purposes. Conflicts are injected with
//! [`MemoryStore::fail_next_commits`] rather than provoked with real
//! concurrency.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, VecDeque};
use std::sync::{Arc, Mutex};
use tokio::sync::OwnedMutexGuard;

use crate::common::{Id, ImportOperationId, LocationId, SettlementId, StewardId};
use crate::domains::imports::models::{ImportOperation, ImportStatus};
use crate::domains::locations::models::{Location, LocationInput};
use crate::domains::settlements::models::{NewSettlement, Settlement};
use crate::domains::stewards::models::{Steward, StewardInput};
use crate::kernel::store::{ConflictKind, IsolationLevel, Store, StoreError, StoreTx};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    settlements: BTreeMap<SettlementId, Settlement>,
    locations: BTreeMap<LocationId, Location>,
    stewards: BTreeMap<StewardId, Steward>,
    imports: BTreeMap<ImportOperationId, ImportOperation>,
}

struct MemoryInner {
    state: Mutex<MemoryState>,
    // Serializes transactions. Held for the lifetime of each open tx.
    gate: Arc<tokio::sync::Mutex<()>>,
    // One entry per upcoming commit: None lets it through, Some fails it.
    injected_faults: Mutex<VecDeque<Option<ConflictKind>>>,
}

/// In-memory [`Store`] implementation.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<MemoryInner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MemoryInner {
                state: Mutex::new(MemoryState::default()),
                gate: Arc::new(tokio::sync::Mutex::new(())),
                injected_faults: Mutex::new(VecDeque::new()),
            }),
        }
    }

    /// Make the next `count` commits fail with the given conflict kind.
    ///
    /// The failing transactions are rolled back, so their changes are never
    /// visible. Used to exercise the retry controller.
    pub fn fail_next_commits(&self, kind: ConflictKind, count: usize) {
        let mut faults = self
            .inner
            .injected_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for _ in 0..count {
            faults.push_back(Some(kind));
        }
    }

    /// Let the next `count` commits through untouched, so queued faults hit
    /// a later transaction (e.g. past a bookkeeping commit).
    pub fn pass_next_commits(&self, count: usize) {
        let mut faults = self
            .inner
            .injected_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner());
        for _ in 0..count {
            faults.push_back(None);
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self, _isolation: IsolationLevel) -> Result<Box<dyn StoreTx>, StoreError> {
        let guard = self.inner.gate.clone().lock_owned().await;
        let snapshot = self
            .inner
            .state
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone();
        Ok(Box::new(MemoryTx {
            inner: self.inner.clone(),
            snapshot,
            _guard: guard,
        }))
    }
}

struct MemoryTx {
    inner: Arc<MemoryInner>,
    snapshot: MemoryState,
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn insert_settlement(&mut self, new: NewSettlement) -> Result<Settlement, StoreError> {
        let settlement = Settlement {
            id: Id::new(),
            name: new.name,
            area: new.area,
            population: new.population,
            capital: new.capital,
            meters_above_sea_level: new.meters_above_sea_level,
            telephone_code: new.telephone_code,
            climate: new.climate,
            government: new.government,
            creation_date: Utc::now().date_naive(),
            establishment_date: new.establishment_date,
            location_id: new.location_id,
            steward_id: new.steward_id,
        };
        self.snapshot.settlements.insert(settlement.id, settlement.clone());
        Ok(settlement)
    }

    async fn update_settlement(&mut self, settlement: &Settlement) -> Result<(), StoreError> {
        self.snapshot
            .settlements
            .insert(settlement.id, settlement.clone());
        Ok(())
    }

    async fn delete_settlement(&mut self, id: SettlementId) -> Result<bool, StoreError> {
        Ok(self.snapshot.settlements.remove(&id).is_some())
    }

    async fn find_settlement(
        &mut self,
        id: SettlementId,
    ) -> Result<Option<Settlement>, StoreError> {
        Ok(self.snapshot.settlements.get(&id).cloned())
    }

    async fn all_settlements(&mut self) -> Result<Vec<Settlement>, StoreError> {
        Ok(self.snapshot.settlements.values().cloned().collect())
    }

    async fn settlement_name_taken(
        &mut self,
        name: &str,
        exclude: Option<SettlementId>,
    ) -> Result<bool, StoreError> {
        let needle = name.to_lowercase();
        Ok(self
            .snapshot
            .settlements
            .values()
            .any(|s| s.name.to_lowercase() == needle && Some(s.id) != exclude))
    }

    async fn count_settlements_by_location(
        &mut self,
        location_id: LocationId,
    ) -> Result<u64, StoreError> {
        Ok(self
            .snapshot
            .settlements
            .values()
            .filter(|s| s.location_id == location_id)
            .count() as u64)
    }

    async fn count_settlements_by_steward(
        &mut self,
        steward_id: StewardId,
    ) -> Result<u64, StoreError> {
        Ok(self
            .snapshot
            .settlements
            .values()
            .filter(|s| s.steward_id == Some(steward_id))
            .count() as u64)
    }

    async fn settlement_ids_by_location(
        &mut self,
        location_id: LocationId,
    ) -> Result<Vec<SettlementId>, StoreError> {
        Ok(self
            .snapshot
            .settlements
            .values()
            .filter(|s| s.location_id == location_id)
            .map(|s| s.id)
            .collect())
    }

    async fn settlement_ids_by_steward(
        &mut self,
        steward_id: StewardId,
    ) -> Result<Vec<SettlementId>, StoreError> {
        Ok(self
            .snapshot
            .settlements
            .values()
            .filter(|s| s.steward_id == Some(steward_id))
            .map(|s| s.id)
            .collect())
    }

    async fn insert_location(&mut self, input: &LocationInput) -> Result<Location, StoreError> {
        let location = Location {
            id: Id::new(),
            x: input.x,
            y: input.y,
        };
        self.snapshot.locations.insert(location.id, location.clone());
        Ok(location)
    }

    async fn update_location(&mut self, location: &Location) -> Result<(), StoreError> {
        self.snapshot.locations.insert(location.id, location.clone());
        Ok(())
    }

    async fn delete_location(&mut self, id: LocationId) -> Result<bool, StoreError> {
        Ok(self.snapshot.locations.remove(&id).is_some())
    }

    async fn find_location(&mut self, id: LocationId) -> Result<Option<Location>, StoreError> {
        Ok(self.snapshot.locations.get(&id).cloned())
    }

    async fn all_locations(&mut self) -> Result<Vec<Location>, StoreError> {
        Ok(self.snapshot.locations.values().cloned().collect())
    }

    async fn location_at(
        &mut self,
        x: f32,
        y: f32,
        exclude: Option<LocationId>,
    ) -> Result<Option<LocationId>, StoreError> {
        Ok(self
            .snapshot
            .locations
            .values()
            .find(|l| l.x == x && l.y == y && Some(l.id) != exclude)
            .map(|l| l.id))
    }

    async fn insert_steward(&mut self, input: &StewardInput) -> Result<Steward, StoreError> {
        let steward = Steward {
            id: Id::new(),
            height: input.height,
        };
        self.snapshot.stewards.insert(steward.id, steward.clone());
        Ok(steward)
    }

    async fn update_steward(&mut self, steward: &Steward) -> Result<(), StoreError> {
        self.snapshot.stewards.insert(steward.id, steward.clone());
        Ok(())
    }

    async fn delete_steward(&mut self, id: StewardId) -> Result<bool, StoreError> {
        Ok(self.snapshot.stewards.remove(&id).is_some())
    }

    async fn find_steward(&mut self, id: StewardId) -> Result<Option<Steward>, StoreError> {
        Ok(self.snapshot.stewards.get(&id).cloned())
    }

    async fn all_stewards(&mut self) -> Result<Vec<Steward>, StoreError> {
        Ok(self.snapshot.stewards.values().cloned().collect())
    }

    async fn insert_import(&mut self) -> Result<ImportOperation, StoreError> {
        let op = ImportOperation {
            id: Id::new(),
            status: ImportStatus::InProgress,
            started_at: Utc::now(),
            finished_at: None,
            added_count: None,
            error_message: None,
        };
        self.snapshot.imports.insert(op.id, op.clone());
        Ok(op)
    }

    async fn update_import(&mut self, op: &ImportOperation) -> Result<(), StoreError> {
        self.snapshot.imports.insert(op.id, op.clone());
        Ok(())
    }

    async fn find_import(
        &mut self,
        id: ImportOperationId,
    ) -> Result<Option<ImportOperation>, StoreError> {
        Ok(self.snapshot.imports.get(&id).cloned())
    }

    async fn all_imports(&mut self) -> Result<Vec<ImportOperation>, StoreError> {
        Ok(self.snapshot.imports.values().cloned().collect())
    }

    async fn commit(self: Box<Self>) -> Result<(), StoreError> {
        let fault = self
            .inner
            .injected_faults
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front()
            .flatten();
        if let Some(kind) = fault {
            return Err(match kind {
                ConflictKind::Serialization => StoreError::Serialization,
                ConflictKind::Deadlock => StoreError::Deadlock,
            });
        }
        *self.inner.state.lock().unwrap_or_else(|e| e.into_inner()) = self.snapshot;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<(), StoreError> {
        Ok(())
    }
}
