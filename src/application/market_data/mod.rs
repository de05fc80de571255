// Market data processing modules
pub mod candle_patterns;
pub mod indicator_engine;
