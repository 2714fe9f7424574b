use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::common::errors::ItemError;
use crate::common::{LocationId, Patch, RegistryError, RelationInput, StewardId};
use crate::domains::locations::models::LocationInput;
use crate::domains::stewards::models::StewardInput;

use super::settlement::{Climate, Government};

pub const MAX_TELEPHONE_CODE: i32 = 100_000;

/// Create request for a settlement. Relation fields arrive pre-decoded
/// into [`RelationInput`]; the transport layer builds them with
/// `RelationInput::from_parts`.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementInput {
    pub name: String,
    pub area: i32,
    pub population: i64,
    pub capital: bool,
    pub meters_above_sea_level: Option<i32>,
    pub telephone_code: Option<i32>,
    pub climate: Climate,
    pub government: Option<Government>,
    pub establishment_date: Option<NaiveDate>,
    /// Required: exactly one of reference or inline.
    pub location: RelationInput<LocationId, LocationInput>,
    /// Optional: at most one of reference or inline.
    pub steward: RelationInput<StewardId, StewardInput>,
}

impl SettlementInput {
    /// Entity-level constraint violations, keyed by field path.
    ///
    /// Includes the reference/embed exclusivity rules so the bulk importer
    /// can aggregate everything in one pass.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let mut fields = scalar_field_errors(
            &self.name,
            self.area,
            self.population,
            self.telephone_code,
        );

        if self.location.is_absent() {
            fields.insert(
                "location".to_string(),
                "provide either location_id or an inline location (exactly one)".to_string(),
            );
        }
        if let RelationInput::Inline(location) = &self.location {
            for (field, message) in location.field_errors() {
                fields.insert(format!("location.{field}"), message);
            }
        }
        if let RelationInput::Inline(steward) = &self.steward {
            for (field, message) in steward.field_errors() {
                fields.insert(format!("steward.{field}"), message);
            }
        }

        fields
    }

    /// Fail with `ValidationFailed` when any constraint is violated.
    pub fn validate(&self) -> Result<(), RegistryError> {
        let fields = self.field_errors();
        if fields.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::ValidationFailed { fields })
        }
    }

    /// Flatten violations into per-item errors for import reporting.
    pub fn item_errors(&self, index: usize) -> Vec<ItemError> {
        self.field_errors()
            .into_iter()
            .map(|(field, message)| ItemError::new(index, field, message))
            .collect()
    }
}

/// Update request for a settlement. Scalars are replaced wholesale;
/// relation fields are presence-tracked, because "set to null" and
/// "not mentioned" are different operations.
#[derive(Debug, Clone, PartialEq)]
pub struct SettlementUpdate {
    pub name: String,
    pub area: i32,
    pub population: i64,
    pub capital: bool,
    pub meters_above_sea_level: Option<i32>,
    pub telephone_code: Option<i32>,
    pub climate: Climate,
    pub government: Option<Government>,
    pub establishment_date: Option<NaiveDate>,
    pub location: Patch<RelationInput<LocationId, LocationInput>>,
    pub steward: Patch<RelationInput<StewardId, StewardInput>>,
}

impl SettlementUpdate {
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let mut fields = scalar_field_errors(
            &self.name,
            self.area,
            self.population,
            self.telephone_code,
        );

        if let Patch::Value(RelationInput::Inline(location)) = &self.location {
            for (field, message) in location.field_errors() {
                fields.insert(format!("location.{field}"), message);
            }
        }
        if let Patch::Value(RelationInput::Inline(steward)) = &self.steward {
            for (field, message) in steward.field_errors() {
                fields.insert(format!("steward.{field}"), message);
            }
        }

        fields
    }

    pub fn validate(&self) -> Result<(), RegistryError> {
        let fields = self.field_errors();
        if fields.is_empty() {
            Ok(())
        } else {
            Err(RegistryError::ValidationFailed { fields })
        }
    }
}

fn scalar_field_errors(
    name: &str,
    area: i32,
    population: i64,
    telephone_code: Option<i32>,
) -> BTreeMap<String, String> {
    let mut fields = BTreeMap::new();
    if name.trim().is_empty() {
        fields.insert("name".to_string(), "name cannot be blank".to_string());
    }
    if area <= 0 {
        fields.insert("area".to_string(), "area must be > 0".to_string());
    }
    if population <= 0 {
        fields.insert(
            "population".to_string(),
            "population must be > 0".to_string(),
        );
    }
    if let Some(code) = telephone_code {
        if code <= 0 || code > MAX_TELEPHONE_CODE {
            fields.insert(
                "telephone_code".to_string(),
                format!("telephone code must be in 1..={MAX_TELEPHONE_CODE}"),
            );
        }
    }
    fields
}
