pub mod data_quality;
