use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_schema::{CLOSE, HIGH, LOW, OPEN, SENTIMENT, VOLUME};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RollingStat {
    Mean,
    /// Sample standard deviation (n - 1 denominator).
    Std,
}

impl RollingStat {
    pub fn as_str(&self) -> &'static str {
        match self {
            RollingStat::Mean => "mean",
            RollingStat::Std => "std",
        }
    }
}

/// Trailing window statistic over one column, current row included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RollingSpec {
    pub column: String,
    pub window: usize,
    pub stat: RollingStat,
}

impl RollingSpec {
    pub fn new(column: &str, window: usize, stat: RollingStat) -> Self {
        Self {
            column: column.to_string(),
            window,
            stat,
        }
    }

    /// e.g. `close_roll_mean3`
    pub fn output_name(&self) -> String {
        format!("{}_roll_{}{}", self.column, self.stat.as_str(), self.window)
    }
}

/// Product of two columns, e.g. `rsi * sentiment`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionSpec {
    pub left: String,
    pub right: String,
}

impl InteractionSpec {
    pub fn new(left: &str, right: &str) -> Self {
        Self {
            left: left.to_string(),
            right: right.to_string(),
        }
    }
}

/// Shape of the derived feature table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    /// Adds the daily sentiment column (left-joined by date).
    pub include_sentiment: bool,
    /// Columns that receive `{col}_lag{k}` copies.
    pub lag_columns: Vec<String>,
    pub lags: Vec<usize>,
    pub rolling: Vec<RollingSpec>,
    pub include_close_change_pct: bool,
    pub include_calendar: bool,
    pub interactions: Vec<InteractionSpec>,
    /// Base columns whose undefined values become 0.0 instead of dropping the row.
    pub zero_fill_columns: Vec<String>,
    /// Columns kept in the table but never fed to a predictor.
    pub excluded_inputs: Vec<String>,
    /// Offset applied to UTC timestamps before deriving date and calendar fields.
    pub utc_offset_minutes: i32,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        let lag_columns = [
            CLOSE,
            OPEN,
            HIGH,
            LOW,
            VOLUME,
            "rsi",
            "macd",
            SENTIMENT,
            "macd_signal",
            "macd_hist",
            "doji",
        ];
        Self {
            include_sentiment: true,
            lag_columns: lag_columns.iter().map(|c| c.to_string()).collect(),
            lags: vec![1, 2],
            rolling: vec![
                RollingSpec::new(CLOSE, 3, RollingStat::Mean),
                RollingSpec::new(CLOSE, 10, RollingStat::Mean),
                RollingSpec::new(CLOSE, 3, RollingStat::Std),
                RollingSpec::new(VOLUME, 3, RollingStat::Mean),
                RollingSpec::new(VOLUME, 10, RollingStat::Mean),
                RollingSpec::new(VOLUME, 3, RollingStat::Std),
            ],
            include_close_change_pct: true,
            include_calendar: true,
            interactions: vec![InteractionSpec::new("rsi", SENTIMENT)],
            zero_fill_columns: vec![SENTIMENT.to_string()],
            excluded_inputs: Vec::new(),
            utc_offset_minutes: 0,
        }
    }
}

impl FeatureConfig {
    /// Raw OHLCV columns only: no lags, rolling stats, calendar or sentiment.
    pub fn minimal() -> Self {
        Self {
            include_sentiment: false,
            lag_columns: Vec::new(),
            lags: Vec::new(),
            rolling: Vec::new(),
            include_close_change_pct: false,
            include_calendar: false,
            interactions: Vec::new(),
            zero_fill_columns: Vec::new(),
            excluded_inputs: Vec::new(),
            utc_offset_minutes: 0,
        }
    }

    pub fn max_lag(&self) -> usize {
        if self.lag_columns.is_empty() {
            return 0;
        }
        self.lags.iter().copied().max().unwrap_or(0)
    }

    pub fn max_rolling_window(&self) -> usize {
        self.rolling.iter().map(|r| r.window).max().unwrap_or(0)
    }

    /// Checks that do not depend on which base columns exist.
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.lags.contains(&0) {
            return Err(ForecastError::InvalidConfig(
                "lag depth must be >= 1".to_string(),
            ));
        }
        for spec in &self.rolling {
            let min_window = match spec.stat {
                RollingStat::Mean => 1,
                RollingStat::Std => 2,
            };
            if spec.window < min_window {
                return Err(ForecastError::InvalidConfig(format!(
                    "rolling {} window on '{}' must be >= {}, got {}",
                    spec.stat.as_str(),
                    spec.column,
                    min_window,
                    spec.window
                )));
            }
        }
        if !(-1440..=1440).contains(&self.utc_offset_minutes) {
            return Err(ForecastError::InvalidConfig(format!(
                "utc_offset_minutes out of range: {}",
                self.utc_offset_minutes
            )));
        }
        Ok(())
    }
}
