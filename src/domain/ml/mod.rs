pub mod feature_frame;
pub mod feature_schema;
pub mod forecast;
pub mod predictor_spec;
pub mod scaling;
