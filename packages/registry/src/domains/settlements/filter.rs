//! Dynamic filter over settlements.
//!
//! A sparse set of optional fields builds one composed predicate. Absent
//! fields contribute no clause at all. Enum fields take raw text and parse
//! case-insensitively so the filter can be bound straight from query
//! parameters.

use chrono::NaiveDate;

use crate::common::{LocationId, RegistryError, SettlementId, StewardId};
use crate::domains::settlements::models::{Climate, Government, Settlement};

pub type SettlementPredicate = Box<dyn Fn(&Settlement) -> bool + Send + Sync>;

#[derive(Debug, Clone, Default)]
pub struct SettlementFilter {
    pub id: Option<SettlementId>,
    pub name_contains: Option<String>,
    pub climate: Option<String>,
    pub government: Option<String>,
    pub population: Option<i64>,
    pub telephone_code: Option<i32>,
    pub capital: Option<bool>,
    pub area: Option<i32>,
    pub meters_above_sea_level: Option<i32>,
    pub location_id: Option<LocationId>,
    pub steward_id: Option<StewardId>,
    pub steward_is_null: Option<bool>,
    pub creation_date: Option<NaiveDate>,
    pub establishment_date: Option<NaiveDate>,
}

impl SettlementFilter {
    /// Compose the set fields into a single predicate.
    ///
    /// Fails with `InvalidFilter` on unparsable enum text or when both
    /// `steward_id` and `steward_is_null` are supplied for the same relation.
    pub fn build(&self) -> Result<SettlementPredicate, RegistryError> {
        if self.steward_id.is_some() && self.steward_is_null.is_some() {
            return Err(RegistryError::InvalidFilter(
                "steward_id and steward_is_null are mutually exclusive".to_string(),
            ));
        }

        let mut clauses: Vec<SettlementPredicate> = Vec::new();

        if let Some(id) = self.id {
            clauses.push(Box::new(move |s| s.id == id));
        }
        if let Some(ref name) = self.name_contains {
            let needle = name.to_lowercase();
            clauses.push(Box::new(move |s| s.name.to_lowercase().contains(&needle)));
        }
        if let Some(ref raw) = self.climate {
            let climate = Climate::parse(raw).map_err(RegistryError::InvalidFilter)?;
            clauses.push(Box::new(move |s| s.climate == climate));
        }
        if let Some(ref raw) = self.government {
            let government = Government::parse(raw).map_err(RegistryError::InvalidFilter)?;
            clauses.push(Box::new(move |s| s.government == Some(government)));
        }
        if let Some(population) = self.population {
            clauses.push(Box::new(move |s| s.population == population));
        }
        if let Some(code) = self.telephone_code {
            clauses.push(Box::new(move |s| s.telephone_code == Some(code)));
        }
        if let Some(capital) = self.capital {
            clauses.push(Box::new(move |s| s.capital == capital));
        }
        if let Some(area) = self.area {
            clauses.push(Box::new(move |s| s.area == area));
        }
        if let Some(elevation) = self.meters_above_sea_level {
            clauses.push(Box::new(move |s| {
                s.meters_above_sea_level == Some(elevation)
            }));
        }
        if let Some(location_id) = self.location_id {
            clauses.push(Box::new(move |s| s.location_id == location_id));
        }
        if let Some(steward_id) = self.steward_id {
            clauses.push(Box::new(move |s| s.steward_id == Some(steward_id)));
        }
        if let Some(is_null) = self.steward_is_null {
            clauses.push(Box::new(move |s| s.steward_id.is_none() == is_null));
        }
        if let Some(date) = self.creation_date {
            clauses.push(Box::new(move |s| s.creation_date == date));
        }
        if let Some(date) = self.establishment_date {
            clauses.push(Box::new(move |s| s.establishment_date == Some(date)));
        }

        Ok(Box::new(move |s| clauses.iter().all(|clause| clause(s))))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::Id;

    fn settlement(name: &str, climate: Climate, capital: bool) -> Settlement {
        Settlement {
            id: Id::new(),
            name: name.to_string(),
            area: 50,
            population: 10_000,
            capital,
            meters_above_sea_level: Some(120),
            telephone_code: Some(218),
            climate,
            government: Some(Government::Demarchy),
            creation_date: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            establishment_date: None,
            location_id: Id::new(),
            steward_id: None,
        }
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        let predicate = SettlementFilter::default().build().unwrap();
        assert!(predicate(&settlement("Bergen", Climate::Tundra, false)));
    }

    #[test]
    fn test_name_substring_is_case_insensitive() {
        let filter = SettlementFilter {
            name_contains: Some("ERG".to_string()),
            ..Default::default()
        };
        let predicate = filter.build().unwrap();
        assert!(predicate(&settlement("Bergen", Climate::Tundra, false)));
        assert!(!predicate(&settlement("Oslo", Climate::Tundra, false)));
    }

    #[test]
    fn test_clauses_compose_with_and() {
        let filter = SettlementFilter {
            climate: Some("tundra".to_string()),
            capital: Some(true),
            ..Default::default()
        };
        let predicate = filter.build().unwrap();
        assert!(predicate(&settlement("Bergen", Climate::Tundra, true)));
        assert!(!predicate(&settlement("Bergen", Climate::Tundra, false)));
        assert!(!predicate(&settlement("Bergen", Climate::RainForest, true)));
    }

    #[test]
    fn test_unknown_enum_text_names_allowed_values() {
        let filter = SettlementFilter {
            climate: Some("DESERT".to_string()),
            ..Default::default()
        };
        // The Ok side is a boxed closure without Debug, so unwrap_err is unavailable.
        let err = match filter.build() {
            Ok(_) => panic!("expected InvalidFilter"),
            Err(err) => err,
        };
        match err {
            RegistryError::InvalidFilter(message) => {
                assert!(message.contains("TUNDRA"));
            }
            other => panic!("expected InvalidFilter, got {other:?}"),
        }
    }

    #[test]
    fn test_steward_filters_are_mutually_exclusive() {
        let filter = SettlementFilter {
            steward_id: Some(Id::new()),
            steward_is_null: Some(true),
            ..Default::default()
        };
        assert!(matches!(
            filter.build(),
            Err(RegistryError::InvalidFilter(_))
        ));
    }

    #[test]
    fn test_steward_is_null_clause() {
        let filter = SettlementFilter {
            steward_is_null: Some(true),
            ..Default::default()
        };
        let predicate = filter.build().unwrap();
        let mut with_steward = settlement("Bergen", Climate::Tundra, false);
        with_steward.steward_id = Some(Id::new());
        assert!(!predicate(&with_steward));
        assert!(predicate(&settlement("Oslo", Climate::Tundra, false)));
    }
}
