//! Reference-or-embed relation inputs and presence-tracked patches.
//!
//! A relation field on a mutation request can arrive as an ID reference or
//! as an inline object to create. Decoding that pair once into a tagged
//! union lets downstream logic switch on the tag instead of testing
//! nullness combinations.
//!
//! Partial updates additionally need to distinguish "field not mentioned"
//! from "field explicitly cleared". A plain `Option` cannot represent
//! both, so mutable relation fields use [`Patch`].

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A relation supplied on create: by reference, inline, or not at all.
#[derive(Debug, Clone, PartialEq)]
pub enum RelationInput<I, T> {
    /// Reference an existing row by ID.
    ById(I),
    /// Create the related row inline as part of this mutation.
    Inline(T),
    /// The relation was not supplied.
    Absent,
}

impl<I, T> RelationInput<I, T> {
    /// Decode the `(id, inline)` field pair a transport binds separately.
    ///
    /// Supplying both is always an error; which of `ById`/`Inline`/`Absent`
    /// is acceptable depends on the operation and is enforced by the
    /// service, not here.
    pub fn from_parts(id: Option<I>, inline: Option<T>) -> Result<Self, String> {
        match (id, inline) {
            (Some(_), Some(_)) => Err("provide either an id reference or an inline object, not both".to_string()),
            (Some(id), None) => Ok(RelationInput::ById(id)),
            (None, Some(value)) => Ok(RelationInput::Inline(value)),
            (None, None) => Ok(RelationInput::Absent),
        }
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, RelationInput::Absent)
    }
}

impl<I, T> Default for RelationInput<I, T> {
    fn default() -> Self {
        RelationInput::Absent
    }
}

/// Presence-tracked value for partial updates: unset / set-to-null /
/// set-to-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Patch<T> {
    /// Field absent from the request: leave the current value untouched.
    #[default]
    Unset,
    /// Field present and explicitly null: clear the current value.
    Null,
    /// Field present with a value: replace the current value.
    Value(T),
}

impl<T> Patch<T> {
    pub fn is_unset(&self) -> bool {
        matches!(self, Patch::Unset)
    }
}

/// Deserializes `null` as `Null` and a value as `Value`. Combined with
/// `#[serde(default)]` on the field, a missing key becomes `Unset`.
impl<'de, T: Deserialize<'de>> Deserialize<'de> for Patch<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Option::<T>::deserialize(deserializer).map(|opt| match opt {
            Some(value) => Patch::Value(value),
            None => Patch::Null,
        })
    }
}

impl<T: Serialize> Serialize for Patch<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Patch::Value(value) => serializer.serialize_some(value),
            _ => serializer.serialize_none(),
        }
    }
}
