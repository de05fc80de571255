// Market data domain
pub mod benchmark;
pub mod candle;
pub mod indicator_row;
pub mod timeframe;
