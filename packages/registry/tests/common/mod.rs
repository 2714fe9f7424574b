// Common test utilities

#![allow(dead_code)]

use std::sync::Arc;

use registry_core::common::{PageRequest, RelationInput};
use registry_core::domains::imports::ImportService;
use registry_core::domains::locations::models::LocationInput;
use registry_core::domains::locations::LocationService;
use registry_core::domains::settlements::models::{
    Climate, SettlementInput, SettlementUpdate,
};
use registry_core::domains::settlements::{SettlementData, SettlementService};
use registry_core::domains::stewards::models::StewardInput;
use registry_core::domains::stewards::StewardService;
use registry_core::kernel::store::memory::MemoryStore;
use registry_core::kernel::{RegistryDeps, TestNats};

pub struct TestHarness {
    pub settlements: SettlementService,
    pub locations: LocationService,
    pub stewards: StewardService,
    pub imports: ImportService,
    pub store: MemoryStore,
    pub nats: Arc<TestNats>,
}

pub fn harness() -> TestHarness {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
    let (deps, store, nats) = RegistryDeps::test();
    TestHarness {
        settlements: SettlementService::new(deps.clone()),
        locations: LocationService::new(deps.clone()),
        stewards: StewardService::new(deps.clone()),
        imports: ImportService::new(deps),
        store,
        nats,
    }
}

/// A valid settlement create request with an inline location at `(x, y)`.
pub fn settlement_input(name: &str, x: f32, y: f32) -> SettlementInput {
    SettlementInput {
        name: name.to_string(),
        area: 100,
        population: 10_000,
        capital: false,
        meters_above_sea_level: None,
        telephone_code: Some(218),
        climate: Climate::Tundra,
        government: None,
        establishment_date: None,
        location: RelationInput::Inline(LocationInput { x, y }),
        steward: RelationInput::Absent,
    }
}

/// Same request with an inline steward attached.
pub fn settlement_input_with_steward(name: &str, x: f32, y: f32, height: f32) -> SettlementInput {
    let mut input = settlement_input(name, x, y);
    input.steward = RelationInput::Inline(StewardInput { height });
    input
}

/// An update request that keeps all of `data`'s scalar values and leaves
/// both relations untouched.
pub fn update_keeping(data: &SettlementData) -> SettlementUpdate {
    SettlementUpdate {
        name: data.name.clone(),
        area: data.area,
        population: data.population,
        capital: data.capital,
        meters_above_sea_level: data.meters_above_sea_level,
        telephone_code: data.telephone_code,
        climate: data.climate,
        government: data.government,
        establishment_date: data.establishment_date,
        location: Default::default(),
        steward: Default::default(),
    }
}

pub fn first_page() -> PageRequest {
    PageRequest {
        page: Some(0),
        size: Some(20),
    }
}
