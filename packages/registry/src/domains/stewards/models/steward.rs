use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::StewardId;

/// A person who may govern settlements.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Steward {
    pub id: StewardId,
    pub height: f32,
}

/// Steward fields as supplied by a caller, standalone or inline inside a
/// settlement mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StewardInput {
    pub height: f32,
}

impl StewardInput {
    /// Entity-level constraint check; keys are field names.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        if !self.height.is_finite() || self.height <= 0.0 {
            fields.insert("height".to_string(), "height must be > 0".to_string());
        }
        fields
    }
}
