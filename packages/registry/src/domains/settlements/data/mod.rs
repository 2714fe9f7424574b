pub mod settlement;

pub use settlement::SettlementData;
