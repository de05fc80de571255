// Domain-specific error types
pub mod errors;

// Candles, timeframes and indicator rows
pub mod market;

// Feature tables, schemas and forecast output
pub mod ml;

// Exogenous daily sentiment
pub mod sentiment;

// Candle sanity checks at ingestion
pub mod validation;
