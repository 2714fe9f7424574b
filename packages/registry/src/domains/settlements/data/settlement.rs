use chrono::NaiveDate;
use serde::Serialize;

use crate::common::SettlementId;
use crate::domains::locations::models::Location;
use crate::domains::stewards::models::Steward;

use super::super::models::{Climate, Government, Settlement};

/// Fully resolved settlement representation returned to callers and
/// embedded in change-event payloads: relations are expanded, not IDs.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SettlementData {
    pub id: SettlementId,
    pub name: String,
    pub area: i32,
    pub population: i64,
    pub capital: bool,
    pub meters_above_sea_level: Option<i32>,
    pub telephone_code: Option<i32>,
    pub climate: Climate,
    pub government: Option<Government>,
    pub creation_date: NaiveDate,
    pub establishment_date: Option<NaiveDate>,
    pub location: Location,
    pub steward: Option<Steward>,
}

impl SettlementData {
    pub fn assemble(settlement: Settlement, location: Location, steward: Option<Steward>) -> Self {
        Self {
            id: settlement.id,
            name: settlement.name,
            area: settlement.area,
            population: settlement.population,
            capital: settlement.capital,
            meters_above_sea_level: settlement.meters_above_sea_level,
            telephone_code: settlement.telephone_code,
            climate: settlement.climate,
            government: settlement.government,
            creation_date: settlement.creation_date,
            establishment_date: settlement.establishment_date,
            location,
            steward,
        }
    }
}
