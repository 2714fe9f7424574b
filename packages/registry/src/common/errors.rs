//! Boundary error taxonomy for the registry.
//!
//! Every failure surfaced by a service carries a stable machine-readable
//! `kind()` plus whatever structured detail a caller needs to act without
//! re-querying (field maps, blocking IDs, usage counts).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use uuid::Uuid;

use crate::common::entity_ids::SettlementId;

/// One validation failure inside a bulk-import batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemError {
    pub index: usize,
    pub field: String,
    pub message: String,
}

impl ItemError {
    pub fn new(index: usize, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            index,
            field: field.into(),
            message: message.into(),
        }
    }
}

/// Errors surfaced at the service boundary.
#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("{entity} not found")]
    NotFound { entity: String, id: Option<Uuid> },

    #[error("{entity} not found: {id}")]
    RelatedNotFound { entity: String, id: Uuid },

    #[error("{entity} id={id} is referenced by {usage_count} settlements: {blocking_ids:?}")]
    DeletionBlocked {
        entity: String,
        id: Uuid,
        usage_count: u64,
        blocking_ids: Vec<SettlementId>,
    },

    #[error("{0}")]
    InvalidArgument(String),

    #[error("{0}")]
    InvalidFilter(String),

    #[error("validation failed")]
    ValidationFailed { fields: BTreeMap<String, String> },

    #[error("import validation failed")]
    ImportValidationFailed { items: Vec<ItemError> },

    #[error("{message}")]
    BusinessRuleViolation { code: &'static str, message: String },

    #[error("concurrent update conflict, please retry")]
    OptimisticConflict,

    #[error("concurrent transaction conflict after {attempts} attempts, please retry")]
    SerializationConflict { attempts: u32 },

    #[error("deadlock detected, request not retried")]
    Deadlock,

    #[error("data integrity violation: {0}")]
    IntegrityViolation(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl RegistryError {
    /// Stable machine-readable error kind, matching the wire contract.
    pub fn kind(&self) -> &'static str {
        match self {
            RegistryError::NotFound { .. } => "not_found",
            RegistryError::RelatedNotFound { .. } => "related_entity_not_found",
            RegistryError::DeletionBlocked { .. } => "deletion_blocked",
            RegistryError::InvalidArgument(_) => "bad_request",
            RegistryError::InvalidFilter(_) => "invalid_filter",
            RegistryError::ValidationFailed { .. } => "validation_failed",
            RegistryError::ImportValidationFailed { .. } => "import_validation_failed",
            RegistryError::BusinessRuleViolation { .. } => "business_rule_violation",
            RegistryError::OptimisticConflict => "optimistic_lock_conflict",
            RegistryError::SerializationConflict { .. } => "serialization_failure",
            RegistryError::Deadlock => "deadlock",
            RegistryError::IntegrityViolation(_) => "data_integrity_violation",
            RegistryError::Store(_) => "store_error",
            RegistryError::Internal(_) => "internal_error",
        }
    }

    pub fn not_found(entity: impl Into<String>, id: impl Into<Uuid>) -> Self {
        RegistryError::NotFound {
            entity: entity.into(),
            id: Some(id.into()),
        }
    }

    pub fn related_not_found(entity: impl Into<String>, id: impl Into<Uuid>) -> Self {
        RegistryError::RelatedNotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn business_rule(code: &'static str, message: impl Into<String>) -> Self {
        RegistryError::BusinessRuleViolation {
            code,
            message: message.into(),
        }
    }
}

/// Business-rule codes surfaced in `BusinessRuleViolation`.
pub mod rule {
    pub const NAME_NOT_UNIQUE: &str = "NAME_NOT_UNIQUE";
    pub const CAPITAL_REQUIRES_GOVERNOR: &str = "CAPITAL_REQUIRES_GOVERNOR";
    pub const LOCATION_NOT_UNIQUE: &str = "LOCATION_NOT_UNIQUE";
}
