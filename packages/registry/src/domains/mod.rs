pub mod imports;
pub mod locations;
pub mod settlements;
pub mod stewards;
