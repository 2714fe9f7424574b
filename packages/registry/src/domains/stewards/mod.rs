pub mod models;
pub mod service;

pub use service::{StewardFilter, StewardService};
