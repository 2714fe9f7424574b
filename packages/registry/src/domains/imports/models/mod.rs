pub mod import_operation;

pub use import_operation::{ImportOperation, ImportStatus};
