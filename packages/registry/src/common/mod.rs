// Common types and utilities shared across the application

pub mod entity_ids;
pub mod errors;
pub mod id;
pub mod pagination;
pub mod relation;

pub use entity_ids::*;
pub use errors::{ItemError, RegistryError};
pub use id::Id;
pub use pagination::{PageDto, PageRequest, PageWindow};
pub use relation::{Patch, RelationInput};
