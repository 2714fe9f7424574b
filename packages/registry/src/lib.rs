// Settlement Registry - API Core
//
// This crate provides the transactional mutation and consistency layer for
// the settlement registry: CRUD services over settlements, locations and
// stewards, dynamic filter/sort resolution, a serializable retry controller,
// post-commit change notifications, and the bulk-import orchestrator.
//
// HTTP routing, request binding and the real-time transport live in
// external collaborators; this crate exposes services and traits only.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
