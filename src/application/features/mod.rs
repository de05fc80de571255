pub mod derivation;
pub mod feature_builder;
pub mod fill_policy;
