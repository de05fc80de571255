use crate::domain::validation::data_quality::StrictCandleValidator;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// One OHLCV bar. `timestamp` is the bar open time in epoch milliseconds (UTC).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Candle {
    pub symbol: String,
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    pub timestamp: i64,
}

/// Candle prices as `f64`, the numeric boundary for indicator math.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OhlcvBar {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Candle {
    pub fn to_bar(&self) -> OhlcvBar {
        OhlcvBar {
            timestamp: self.timestamp,
            open: self.open.to_f64().unwrap_or(f64::NAN),
            high: self.high.to_f64().unwrap_or(f64::NAN),
            low: self.low.to_f64().unwrap_or(f64::NAN),
            close: self.close.to_f64().unwrap_or(f64::NAN),
            volume: self.volume.to_f64().unwrap_or(f64::NAN),
        }
    }
}

/// Ordered, timestamp-unique candle series for one symbol.
///
/// Ingestion upserts on timestamp (last write wins); readers always see
/// candles in ascending timestamp order.
#[derive(Debug, Clone, Default)]
pub struct CandleStore {
    symbol: String,
    candles: BTreeMap<i64, Candle>,
}

impl CandleStore {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            candles: BTreeMap::new(),
        }
    }

    pub fn from_candles(symbol: impl Into<String>, candles: impl IntoIterator<Item = Candle>) -> Self {
        let mut store = Self::new(symbol);
        for candle in candles {
            store.upsert(candle);
        }
        store
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Inserts or replaces the candle at its timestamp.
    ///
    /// Returns false (and keeps the previous value) when the candle fails validation.
    pub fn upsert(&mut self, candle: Candle) -> bool {
        if !StrictCandleValidator::validate_candle(&candle) {
            return false;
        }
        if let Some(previous) = self.candles.insert(candle.timestamp, candle) {
            debug!(
                "CandleStore[{}]: replaced candle at {}",
                self.symbol, previous.timestamp
            );
        }
        true
    }

    pub fn len(&self) -> usize {
        self.candles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candles.is_empty()
    }

    pub fn candles(&self) -> Vec<Candle> {
        self.candles.values().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candle> {
        self.candles.values()
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.candles.keys().next().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.candles.keys().next_back().copied()
    }

    /// Candles with `from <= timestamp < to`.
    pub fn range(&self, from: i64, to: i64) -> Vec<Candle> {
        if from >= to {
            return Vec::new();
        }
        self.candles.range(from..to).map(|(_, c)| c.clone()).collect()
    }
}
