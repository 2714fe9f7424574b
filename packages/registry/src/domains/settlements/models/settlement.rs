use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::common::{LocationId, SettlementId, StewardId};

/// Climate of a settlement. Wire names match the storage enum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Climate {
    #[serde(rename = "RAIN_FOREST")]
    #[sqlx(rename = "RAIN_FOREST")]
    RainForest,
    #[serde(rename = "HUMIDSUBTROPICAL")]
    #[sqlx(rename = "HUMIDSUBTROPICAL")]
    HumidSubtropical,
    #[serde(rename = "TUNDRA")]
    #[sqlx(rename = "TUNDRA")]
    Tundra,
}

impl Climate {
    pub const ALL: [Climate; 3] = [Climate::RainForest, Climate::HumidSubtropical, Climate::Tundra];

    pub fn as_str(&self) -> &'static str {
        match self {
            Climate::RainForest => "RAIN_FOREST",
            Climate::HumidSubtropical => "HUMIDSUBTROPICAL",
            Climate::Tundra => "TUNDRA",
        }
    }

    /// Case-insensitive parse, reporting the allowed values on failure.
    pub fn parse(value: &str) -> Result<Self, String> {
        let needle = value.trim();
        Climate::ALL
            .iter()
            .copied()
            .find(|c| c.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| {
                format!(
                    "unknown climate '{}', allowed: {}",
                    value,
                    Climate::ALL.map(|c| c.as_str()).join(", ")
                )
            })
    }
}

/// Form of government. Optional on a settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
pub enum Government {
    #[serde(rename = "DEMARCHY")]
    #[sqlx(rename = "DEMARCHY")]
    Demarchy,
    #[serde(rename = "KLEPTOCRACY")]
    #[sqlx(rename = "KLEPTOCRACY")]
    Kleptocracy,
    #[serde(rename = "CORPORATOCRACY")]
    #[sqlx(rename = "CORPORATOCRACY")]
    Corporatocracy,
    #[serde(rename = "PLUTOCRACY")]
    #[sqlx(rename = "PLUTOCRACY")]
    Plutocracy,
    #[serde(rename = "THALASSOCRACY")]
    #[sqlx(rename = "THALASSOCRACY")]
    Thalassocracy,
}

impl Government {
    pub const ALL: [Government; 5] = [
        Government::Demarchy,
        Government::Kleptocracy,
        Government::Corporatocracy,
        Government::Plutocracy,
        Government::Thalassocracy,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Government::Demarchy => "DEMARCHY",
            Government::Kleptocracy => "KLEPTOCRACY",
            Government::Corporatocracy => "CORPORATOCRACY",
            Government::Plutocracy => "PLUTOCRACY",
            Government::Thalassocracy => "THALASSOCRACY",
        }
    }

    /// Case-insensitive parse, reporting the allowed values on failure.
    pub fn parse(value: &str) -> Result<Self, String> {
        let needle = value.trim();
        Government::ALL
            .iter()
            .copied()
            .find(|g| g.as_str().eq_ignore_ascii_case(needle))
            .ok_or_else(|| {
                format!(
                    "unknown government '{}', allowed: {}",
                    value,
                    Government::ALL.map(|g| g.as_str()).join(", ")
                )
            })
    }
}

/// A settlement row. Location is required; steward is optional.
///
/// `creation_date` is store-assigned on insert and never updated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Settlement {
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
    pub location_id: LocationId,
    pub steward_id: Option<StewardId>,
}

/// Fields for a settlement insert; id and creation date are assigned by
/// the store.
#[derive(Debug, Clone)]
pub struct NewSettlement {
    pub name: String,
    pub area: i32,
    pub population: i64,
    pub capital: bool,
    pub meters_above_sea_level: Option<i32>,
    pub telephone_code: Option<i32>,
    pub climate: Climate,
    pub government: Option<Government>,
    pub establishment_date: Option<NaiveDate>,
    pub location_id: LocationId,
    pub steward_id: Option<StewardId>,
}

/// Trim surrounding whitespace and capitalize the first letter, the
/// canonical form names are stored and compared in.
pub fn normalize_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let mut chars = trimmed.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
