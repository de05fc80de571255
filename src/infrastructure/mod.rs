pub mod csv_source;
pub mod persistence;
