use crate::application::market_data::candle_patterns;
use crate::config::IndicatorConfig;
use crate::domain::errors::ForecastError;
use crate::domain::market::benchmark::BenchmarkSeries;
use crate::domain::market::candle::OhlcvBar;
use crate::domain::market::indicator_row::{IndicatorColumn, IndicatorRow};
use std::collections::VecDeque;
use ta::Next;
use ta::indicators::{
    ExponentialMovingAverage, Maximum, MovingAverageConvergenceDivergence, RelativeStrengthIndex,
    SimpleMovingAverage,
};
use tracing::{debug, warn};

/// Computes technical indicators over an ordered candle series.
///
/// Every indicator is a left-to-right scan: the value at row `i` depends on
/// rows `0..=i` only. Rows before an indicator's warm-up completes are
/// reported as `NaN` rather than the partial values the underlying
/// recurrences produce.
pub struct IndicatorEngine {
    config: IndicatorConfig,
}

/// Fresh indicator state for one pass over a series.
struct IndicatorState {
    rsi: RelativeStrengthIndex,
    macd: MovingAverageConvergenceDivergence,
    ema_short: ExponentialMovingAverage,
    ema_long: ExponentialMovingAverage,
    volume_short: SimpleMovingAverage,
    volume_long: SimpleMovingAverage,
    rolling_high: Maximum,
    rs_history: RsHistory,
}

/// Trailing `rs_line` values for the `rs_rating` window.
struct RsHistory {
    window: usize,
    values: VecDeque<f64>,
}

impl RsHistory {
    fn new(window: usize) -> Self {
        Self {
            window,
            values: VecDeque::with_capacity(window),
        }
    }

    /// Pushes `rs_line` and returns `last / mean * 100` over the window, or
    /// `NaN` until the window is full of defined values.
    fn next(&mut self, rs_line: f64) -> f64 {
        if self.values.len() == self.window {
            self.values.pop_front();
        }
        self.values.push_back(rs_line);
        if self.values.len() < self.window || self.values.iter().any(|v| !v.is_finite()) {
            return f64::NAN;
        }
        let mean = self.values.iter().sum::<f64>() / self.window as f64;
        if mean > 0.0 { rs_line / mean * 100.0 } else { f64::NAN }
    }
}

fn invalid(name: &str, err: ta::errors::TaError) -> ForecastError {
    ForecastError::InvalidConfig(format!("{} indicator rejected its period: {:?}", name, err))
}

impl IndicatorState {
    fn new(config: &IndicatorConfig) -> Result<Self, ForecastError> {
        Ok(Self {
            rsi: RelativeStrengthIndex::new(config.rsi_period).map_err(|e| invalid("rsi", e))?,
            macd: MovingAverageConvergenceDivergence::new(
                config.macd_fast,
                config.macd_slow,
                config.macd_signal,
            )
            .map_err(|e| invalid("macd", e))?,
            ema_short: ExponentialMovingAverage::new(config.ema_short)
                .map_err(|e| invalid("ema_short", e))?,
            ema_long: ExponentialMovingAverage::new(config.ema_long)
                .map_err(|e| invalid("ema_long", e))?,
            volume_short: SimpleMovingAverage::new(config.volume_short)
                .map_err(|e| invalid("volume_short", e))?,
            volume_long: SimpleMovingAverage::new(config.volume_long)
                .map_err(|e| invalid("volume_long", e))?,
            rolling_high: Maximum::new(config.high_window)
                .map_err(|e| invalid("rolling_high", e))?,
            rs_history: RsHistory::new(config.rs_window),
        })
    }
}

impl IndicatorEngine {
    pub fn new(config: IndicatorConfig) -> Result<Self, ForecastError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &IndicatorConfig {
        &self.config
    }

    /// Leading rows that are undefined in at least one selected column.
    pub fn warmup(&self) -> usize {
        self.config
            .columns
            .iter()
            .map(|c| self.config.warmup(*c))
            .max()
            .unwrap_or(0)
    }

    /// One [`IndicatorRow`] per input bar, in the same order.
    ///
    /// `benchmark` is required when a relative-strength column is selected.
    /// A bar without a benchmark close at its timestamp gets an undefined
    /// `rs_line`, which keeps `rs_rating` undefined for a full window.
    pub fn compute(
        &self,
        bars: &[OhlcvBar],
        benchmark: Option<&BenchmarkSeries>,
    ) -> Result<Vec<IndicatorRow>, ForecastError> {
        if self.config.needs_benchmark() && benchmark.is_none() {
            return Err(ForecastError::InvalidConfig(
                "relative strength columns need a benchmark series".to_string(),
            ));
        }
        let mut state = IndicatorState::new(&self.config)?;
        let mut rows = Vec::with_capacity(bars.len());
        let mut missing_benchmark = 0;

        for (i, bar) in bars.iter().enumerate() {
            let rsi = state.rsi.next(bar.close);
            let macd = state.macd.next(bar.close);
            let ema_short = state.ema_short.next(bar.close);
            let ema_long = state.ema_long.next(bar.close);
            let avg_volume_short = state.volume_short.next(bar.volume);
            let avg_volume_long = state.volume_long.next(bar.volume);
            let rolling_high = state.rolling_high.next(bar.close);

            let mask = |column: IndicatorColumn, value: f64| {
                if i < self.config.warmup(column) {
                    f64::NAN
                } else {
                    value
                }
            };

            let volume_ratio = if avg_volume_long > 0.0 {
                bar.volume / avg_volume_long
            } else {
                0.0
            };
            let distance_from_high = (bar.close - rolling_high) / rolling_high;
            let engulfing = if i == 0 {
                f64::NAN
            } else {
                candle_patterns::engulfing(&bars[i - 1], bar)
            };

            let rs_line = match benchmark.map(|b| b.close_at(bar.timestamp)) {
                Some(Some(index_close)) if index_close > 0.0 => bar.close / index_close,
                Some(_) => {
                    missing_benchmark += 1;
                    f64::NAN
                }
                None => f64::NAN,
            };
            let rs_rating = mask(IndicatorColumn::RsRating, state.rs_history.next(rs_line));
            let rsi = mask(IndicatorColumn::Rsi, rsi);
            let volume_ratio = mask(IndicatorColumn::VolumeRatio, volume_ratio);
            let master_score = mask(
                IndicatorColumn::MasterScore,
                (rsi / 100.0 + rs_rating / 100.0 + volume_ratio) / 3.0,
            );

            rows.push(IndicatorRow {
                bar: *bar,
                rsi,
                macd: mask(IndicatorColumn::Macd, macd.macd),
                macd_signal: mask(IndicatorColumn::MacdSignal, macd.signal),
                macd_hist: mask(IndicatorColumn::MacdHist, macd.histogram),
                ema_50: mask(IndicatorColumn::Ema50, ema_short),
                ema_200: mask(IndicatorColumn::Ema200, ema_long),
                doji: candle_patterns::doji(bar, self.config.doji_body_ratio),
                engulfing,
                avg_volume_10: mask(IndicatorColumn::AvgVolume10, avg_volume_short),
                avg_volume_50: mask(IndicatorColumn::AvgVolume50, avg_volume_long),
                volume_ratio,
                rolling_high_252: mask(IndicatorColumn::RollingHigh252, rolling_high),
                distance_from_high: mask(IndicatorColumn::DistanceFromHigh, distance_from_high),
                rs_line,
                rs_rating,
                master_score,
            });
        }

        if missing_benchmark > 0 {
            warn!(
                "IndicatorEngine: {} bar(s) have no benchmark close, relative strength undefined there",
                missing_benchmark
            );
        }

        debug!(
            "IndicatorEngine: computed {} rows (warm-up {} rows)",
            rows.len(),
            self.warmup()
        );
        Ok(rows)
    }
}
