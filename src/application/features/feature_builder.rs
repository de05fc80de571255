use crate::application::features::derivation::FeatureDeriver;
use crate::application::features::fill_policy::FillPolicyTable;
use crate::application::market_data::indicator_engine::IndicatorEngine;
use crate::config::{self, FeatureConfig, IndicatorConfig};
use crate::domain::errors::{ForecastError, ensure_strictly_increasing};
use crate::domain::market::benchmark::BenchmarkSeries;
use crate::domain::market::candle::{Candle, OhlcvBar};
use crate::domain::market::indicator_row::{IndicatorColumn, IndicatorRow};
use crate::domain::ml::feature_frame::FeatureFrame;
use crate::domain::ml::feature_schema::{FeatureSchema, target_column};
use crate::domain::sentiment::{NEUTRAL_SENTIMENT, SentimentSeries};
use tracing::{debug, info};

/// Turns an ordered candle series into a fixed-schema feature table.
///
/// Order of operations: indicators, sentiment join (explicit zero-fill for
/// dates without a score), fill policies, derived columns, then a single
/// drop of every row that still holds an undefined value.
pub struct FeatureBuilder {
    engine: IndicatorEngine,
    indicator_columns: Vec<IndicatorColumn>,
    include_sentiment: bool,
    deriver: FeatureDeriver,
    fill: FillPolicyTable,
    input_schema: FeatureSchema,
    required_history: usize,
}

impl FeatureBuilder {
    pub fn new(indicators: IndicatorConfig, features: FeatureConfig) -> Result<Self, ForecastError> {
        indicators.validate()?;
        let base_columns = config::base_columns(&indicators, &features);
        for column in &features.zero_fill_columns {
            if !base_columns.contains(column) {
                return Err(ForecastError::UnknownColumn(column.clone()));
            }
        }

        let deriver = FeatureDeriver::new(base_columns, &features)?;

        for column in &features.excluded_inputs {
            if !deriver.columns().contains(column) {
                return Err(ForecastError::UnknownColumn(column.clone()));
            }
        }
        let input_schema = FeatureSchema::new(
            deriver
                .columns()
                .iter()
                .filter(|c| !features.excluded_inputs.contains(c))
                .cloned()
                .collect(),
        );

        let base_starts: Vec<usize> = deriver
            .base_columns()
            .iter()
            .map(|name| {
                name.parse::<IndicatorColumn>()
                    .map(|c| indicators.warmup(c))
                    .unwrap_or(0)
            })
            .collect();
        let required_history = deriver
            .first_defined(&base_starts)
            .into_iter()
            .max()
            .unwrap_or(0)
            + 1;

        let indicator_columns = indicators.columns.clone();
        Ok(Self {
            engine: IndicatorEngine::new(indicators)?,
            indicator_columns,
            include_sentiment: features.include_sentiment,
            deriver,
            fill: FillPolicyTable::zero_fill(&features.zero_fill_columns),
            input_schema,
            required_history,
        })
    }

    pub fn deriver(&self) -> &FeatureDeriver {
        &self.deriver
    }

    pub fn base_columns(&self) -> &[String] {
        self.deriver.base_columns()
    }

    /// Every column of the built table, in order.
    pub fn columns(&self) -> &[String] {
        self.deriver.columns()
    }

    /// Columns a predictor may consume (all columns minus the excluded ones).
    pub fn input_schema(&self) -> &FeatureSchema {
        &self.input_schema
    }

    /// Minimum number of candles that yields at least one complete row.
    ///
    /// Equal to the longest lookback among indicators, lags and rolling
    /// windows, plus one.
    pub fn required_history(&self) -> usize {
        self.required_history
    }

    /// OHLCV + indicators + sentiment per candle, with fill policies applied
    /// but nothing dropped.
    pub fn build_base(
        &self,
        candles: &[Candle],
        sentiment: Option<&SentimentSeries>,
        benchmark: Option<&BenchmarkSeries>,
    ) -> Result<FeatureFrame, ForecastError> {
        let timestamps: Vec<i64> = candles.iter().map(|c| c.timestamp).collect();
        ensure_strictly_increasing(&timestamps, "candle series")?;

        let bars: Vec<OhlcvBar> = candles.iter().map(Candle::to_bar).collect();
        let indicator_rows = self.engine.compute(&bars, benchmark)?;

        let columns = self.base_columns().to_vec();
        let mut frame = FeatureFrame::with_capacity(columns.clone(), indicator_rows.len());
        let mut zero_filled = 0;

        for row in &indicator_rows {
            let mut values = self.base_values(row, sentiment);
            zero_filled += self.fill.apply(&columns, &mut values);
            frame.push_row(row.timestamp(), values)?;
        }

        if zero_filled > 0 {
            debug!("FeatureBuilder: zero-filled {} base cells", zero_filled);
        }
        Ok(frame)
    }

    fn base_values(&self, row: &IndicatorRow, sentiment: Option<&SentimentSeries>) -> Vec<f64> {
        let bar = &row.bar;
        let mut values = vec![bar.open, bar.high, bar.low, bar.close, bar.volume];
        values.extend(self.indicator_columns.iter().map(|c| row.get(*c)));
        if self.include_sentiment {
            let score = match self.deriver.local_date(row.timestamp()) {
                Some(date) => sentiment.map_or(NEUTRAL_SENTIMENT, |s| s.score_for(date)),
                None => f64::NAN,
            };
            values.push(score);
        }
        values
    }

    /// Derived columns for every row of a base frame; nothing dropped.
    pub fn derive_all(&self, base: &FeatureFrame) -> Result<FeatureFrame, ForecastError> {
        let window = self.deriver.history_len();
        let rows = base.rows();
        let mut frame = FeatureFrame::with_capacity(self.columns().to_vec(), rows.len());

        for (i, &timestamp) in base.timestamps().iter().enumerate() {
            let start = (i + 1).saturating_sub(window);
            let values = self.deriver.derive(&rows[start..=i], timestamp)?;
            frame.push_row(timestamp, values)?;
        }
        Ok(frame)
    }

    /// Complete feature rows for inference, without a benchmark index.
    pub fn build(
        &self,
        candles: &[Candle],
        sentiment: Option<&SentimentSeries>,
    ) -> Result<FeatureFrame, ForecastError> {
        let (_, frame) = self.build_frames(candles, sentiment, None)?;
        Ok(frame)
    }

    /// Base frame (every candle) and complete feature rows from one pass.
    ///
    /// The rollout needs both: the base tail seeds synthetic rows, the
    /// feature rows are what gets scaled.
    pub fn build_frames(
        &self,
        candles: &[Candle],
        sentiment: Option<&SentimentSeries>,
        benchmark: Option<&BenchmarkSeries>,
    ) -> Result<(FeatureFrame, FeatureFrame), ForecastError> {
        self.ensure_history(candles.len())?;
        let base = self.build_base(candles, sentiment, benchmark)?;
        let full = self.derive_all(&base)?;
        let frame = drop_undefined(&full)?;

        info!(
            "FeatureBuilder: {} candles -> {} feature rows ({} dropped, {} columns)",
            candles.len(),
            frame.len(),
            candles.len() - frame.len(),
            frame.width()
        );
        Ok((base, frame))
    }

    /// Feature rows plus `{field}_next` target columns (next row's value).
    ///
    /// The last row has no next value and is dropped here; [`build`](Self::build)
    /// keeps it.
    pub fn build_with_targets(
        &self,
        candles: &[Candle],
        sentiment: Option<&SentimentSeries>,
        benchmark: Option<&BenchmarkSeries>,
        targets: &[String],
    ) -> Result<FeatureFrame, ForecastError> {
        if candles.len() <= self.required_history {
            return Err(ForecastError::InsufficientHistory {
                required: self.required_history + 1,
                available: candles.len(),
            });
        }
        let base = self.build_base(candles, sentiment, benchmark)?;
        let full = self.derive_all(&base)?;

        let target_indices = FeatureSchema::new(targets.to_vec()).indices_in(full.columns())?;
        let mut columns = full.columns().to_vec();
        columns.extend(targets.iter().map(|t| target_column(t)));

        let rows = full.rows();
        let mut with_targets = FeatureFrame::with_capacity(columns, rows.len());
        for (i, &timestamp) in full.timestamps().iter().enumerate() {
            let mut values = rows[i].clone();
            values.extend(
                target_indices
                    .iter()
                    .map(|&t| rows.get(i + 1).map_or(f64::NAN, |next| next[t])),
            );
            with_targets.push_row(timestamp, values)?;
        }

        let frame = drop_undefined(&with_targets)?;
        info!(
            "FeatureBuilder: {} training rows with targets [{}]",
            frame.len(),
            targets.join(", ")
        );
        Ok(frame)
    }

    fn ensure_history(&self, available: usize) -> Result<(), ForecastError> {
        if available < self.required_history {
            return Err(ForecastError::InsufficientHistory {
                required: self.required_history,
                available,
            });
        }
        Ok(())
    }
}

/// Keeps only rows whose every value is finite.
fn drop_undefined(frame: &FeatureFrame) -> Result<FeatureFrame, ForecastError> {
    let mut kept = FeatureFrame::with_capacity(frame.columns().to_vec(), frame.len());
    for (row, &timestamp) in frame.rows().iter().zip(frame.timestamps()) {
        if row.iter().all(|v| v.is_finite()) {
            kept.push_row(timestamp, row.clone())?;
        }
    }
    Ok(kept)
}
