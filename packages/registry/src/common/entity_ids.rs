//! Typed ID definitions for all domain entities.
//!
//! Type aliases per entity give compile-time safety for ID usage across
//! the services and the store.

pub use super::id::Id;

// ============================================================================
// Entity marker types
// ============================================================================

/// Marker type for Settlement entities.
pub struct Settlement;

/// Marker type for Location entities (coordinate pairs).
pub struct Location;

/// Marker type for Steward entities (persons who may govern a settlement).
pub struct Steward;

/// Marker type for ImportOperation ledger entries.
pub struct ImportOperation;

// ============================================================================
// Type aliases - the primary API
// ============================================================================

/// Typed ID for Settlement entities.
pub type SettlementId = Id<Settlement>;

/// Typed ID for Location entities.
pub type LocationId = Id<Location>;

/// Typed ID for Steward entities.
pub type StewardId = Id<Steward>;

/// Typed ID for ImportOperation ledger entries.
pub type ImportOperationId = Id<ImportOperation>;
