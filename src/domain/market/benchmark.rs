use crate::domain::market::candle::CandleStore;
use std::collections::BTreeMap;

/// Closing prices of a benchmark index, keyed by candle timestamp.
///
/// Relative-strength indicators look up the benchmark bar at exactly the
/// candle's timestamp; a missing bar leaves that row undefined.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BenchmarkSeries {
    symbol: String,
    closes: BTreeMap<i64, f64>,
}

impl BenchmarkSeries {
    pub fn from_points(symbol: impl Into<String>, points: impl IntoIterator<Item = (i64, f64)>) -> Self {
        Self {
            symbol: symbol.into(),
            closes: points.into_iter().collect(),
        }
    }

    pub fn from_store(store: &CandleStore) -> Self {
        Self::from_points(
            store.symbol(),
            store.iter().map(|c| (c.timestamp, c.to_bar().close)),
        )
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn len(&self) -> usize {
        self.closes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.closes.is_empty()
    }

    /// Benchmark close at `timestamp`, if a bar exists there.
    pub fn close_at(&self, timestamp: i64) -> Option<f64> {
        self.closes.get(&timestamp).copied()
    }
}
