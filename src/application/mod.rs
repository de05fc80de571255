// Candle and sentiment rows into fixed-schema feature tables
pub mod features;

// Technical indicators and candle patterns
pub mod market_data;

// Scaling, splits, windows, predictors and the recursive rollout
pub mod ml;

// End-to-end wiring
pub mod forecast_pipeline;
