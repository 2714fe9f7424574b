pub mod steward;

pub use steward::{Steward, StewardInput};
