//! Single- and two-candle pattern flags.
//!
//! Both flags read only the OHLC fields of the current candle (and, for
//! engulfing, the one before it), so they never look ahead.

use crate::domain::market::candle::OhlcvBar;

/// 1.0 when the body is at most `body_ratio` of the high-low range, else 0.0.
///
/// A flat candle (high == low) is a doji only if it also opened at its close.
pub fn doji(bar: &OhlcvBar, body_ratio: f64) -> f64 {
    let body = (bar.close - bar.open).abs();
    let range = bar.high - bar.low;
    let is_doji = if range <= 0.0 {
        body == 0.0
    } else {
        body <= body_ratio * range
    };
    if is_doji { 1.0 } else { 0.0 }
}

/// +1.0 for a bullish engulfing, -1.0 for a bearish engulfing, 0.0 otherwise.
///
/// The current body must cover the previous body, touching it on at most one
/// side, and the two candles must have opposite colours.
pub fn engulfing(previous: &OhlcvBar, current: &OhlcvBar) -> f64 {
    let prev_bearish = previous.close < previous.open;
    let prev_bullish = previous.close > previous.open;
    let curr_bullish = current.close > current.open;
    let curr_bearish = current.close < current.open;

    if curr_bullish
        && prev_bearish
        && ((current.close >= previous.open && current.open < previous.close)
            || (current.close > previous.open && current.open <= previous.close))
    {
        return 1.0;
    }

    if curr_bearish
        && prev_bullish
        && ((current.open >= previous.close && current.close < previous.open)
            || (current.open > previous.close && current.close <= previous.open))
    {
        return -1.0;
    }

    0.0
}
