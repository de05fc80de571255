use crate::domain::market::candle::Candle;
use rust_decimal::Decimal;
use tracing::warn;

/// Centralized validator for candle integrity.
///
/// Rejects bars that are physically impossible (non-positive prices, inverted range).
pub struct StrictCandleValidator;

impl StrictCandleValidator {
    /// Validates a Candle. Returns true if valid, false otherwise.
    pub fn validate_candle(candle: &Candle) -> bool {
        if candle.open <= Decimal::ZERO
            || candle.high <= Decimal::ZERO
            || candle.low <= Decimal::ZERO
            || candle.close <= Decimal::ZERO
        {
            warn!(
                "Validation FAILED: Candle for {} at {} has non-positive price component(s)",
                candle.symbol, candle.timestamp
            );
            return false;
        }

        if candle.low > candle.high {
            warn!(
                "Validation FAILED: Candle for {} has low {} > high {}",
                candle.symbol, candle.low, candle.high
            );
            return false;
        }

        if candle.open > candle.high
            || candle.open < candle.low
            || candle.close > candle.high
            || candle.close < candle.low
        {
            warn!(
                "Validation FAILED: Candle for {} at {} has open/close outside [low, high]",
                candle.symbol, candle.timestamp
            );
            return false;
        }

        if candle.volume < Decimal::ZERO {
            warn!(
                "Validation FAILED: Candle for {} has negative volume: {}",
                candle.symbol, candle.volume
            );
            return false;
        }

        true
    }
}
