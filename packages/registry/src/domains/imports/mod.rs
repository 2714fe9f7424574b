pub mod models;
pub mod service;

pub use service::{ImportLedger, ImportResult, ImportService};
