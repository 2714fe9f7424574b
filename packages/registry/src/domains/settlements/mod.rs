pub mod data;
pub mod filter;
pub mod models;
pub mod service;
pub mod sort;

pub use data::SettlementData;
pub use filter::SettlementFilter;
pub use service::{OrphanFlags, SettlementService};
pub use sort::SortSpec;
