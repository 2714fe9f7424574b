pub mod input;
pub mod settlement;

pub use input::{SettlementInput, SettlementUpdate, MAX_TELEPHONE_CODE};
pub use settlement::{normalize_name, Climate, Government, NewSettlement, Settlement};
