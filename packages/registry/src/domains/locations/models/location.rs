use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::common::LocationId;

/// X coordinates are bounded above; no other geometric constraints apply.
pub const MAX_X: f32 = 460.0;

/// A 2D coordinate pair. The `(x, y)` pair is unique across locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Location {
    pub id: LocationId,
    pub x: f32,
    pub y: f32,
}

/// Location fields as supplied by a caller, standalone or inline inside a
/// settlement mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationInput {
    pub x: f32,
    pub y: f32,
}

impl LocationInput {
    /// Entity-level constraint check; keys are field names.
    pub fn field_errors(&self) -> BTreeMap<String, String> {
        let mut fields = BTreeMap::new();
        if !self.x.is_finite() || self.x > MAX_X {
            fields.insert("x".to_string(), format!("x must be finite and <= {MAX_X}"));
        }
        if !self.y.is_finite() {
            fields.insert("y".to_string(), "y must be finite".to_string());
        }
        fields
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_x_bound() {
        let ok = LocationInput { x: 460.0, y: 1.0 };
        assert!(ok.field_errors().is_empty());

        let too_far = LocationInput { x: 460.5, y: 1.0 };
        assert!(too_far.field_errors().contains_key("x"));
    }

    #[test]
    fn test_rejects_non_finite() {
        let nan = LocationInput {
            x: f32::NAN,
            y: f32::INFINITY,
        };
        let errors = nan.field_errors();
        assert!(errors.contains_key("x"));
        assert!(errors.contains_key("y"));
    }
}
