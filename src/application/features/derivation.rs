//! Derived feature columns computed from a trailing history of base rows.
//!
//! [`FeatureDeriver`] is the single implementation of lags, rolling
//! statistics, close change, calendar fields and interactions. The feature
//! builder runs it over known history and the recursive forecaster runs it over
//! synthetic rows, so both produce identical columns from identical inputs.

use crate::config::{FeatureConfig, RollingStat};
use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_schema::{
    CLOSE, CLOSE_CHANGE_PCT, HOUR, MONTH, WEEKDAY, interaction_column, lag_column,
};
use chrono::{Datelike, FixedOffset, NaiveDate, TimeZone, Timelike, Utc};
use statrs::statistics::{Data, Distribution};

/// `(current - previous) / previous`, defined as 0.0 when `previous` is zero.
pub fn pct_change(current: f64, previous: f64) -> f64 {
    if previous == 0.0 {
        0.0
    } else {
        (current - previous) / previous
    }
}

#[derive(Debug, Clone)]
struct LagSource {
    base: usize,
    lag: usize,
}

#[derive(Debug, Clone)]
struct RollingSource {
    base: usize,
    window: usize,
    stat: RollingStat,
}

#[derive(Debug, Clone)]
pub struct FeatureDeriver {
    base_columns: Vec<String>,
    columns: Vec<String>,
    lags: Vec<LagSource>,
    rolling: Vec<RollingSource>,
    close_change: Option<usize>,
    include_calendar: bool,
    interactions: Vec<(usize, usize)>,
    offset: FixedOffset,
    history_len: usize,
}

impl FeatureDeriver {
    pub fn new(base_columns: Vec<String>, config: &FeatureConfig) -> Result<Self, ForecastError> {
        config.validate()?;

        let base_index = |name: &str| {
            base_columns
                .iter()
                .position(|c| c == name)
                .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))
        };

        let mut columns = base_columns.clone();

        let mut lags = Vec::new();
        for column in &config.lag_columns {
            let base = base_index(column)?;
            for &lag in &config.lags {
                columns.push(lag_column(column, lag));
                lags.push(LagSource { base, lag });
            }
        }

        let mut rolling = Vec::new();
        for spec in &config.rolling {
            rolling.push(RollingSource {
                base: base_index(&spec.column)?,
                window: spec.window,
                stat: spec.stat,
            });
            columns.push(spec.output_name());
        }

        let close_change = if config.include_close_change_pct {
            let close = base_index(CLOSE)?;
            columns.push(CLOSE_CHANGE_PCT.to_string());
            Some(close)
        } else {
            None
        };

        if config.include_calendar {
            columns.extend([HOUR, WEEKDAY, MONTH].iter().map(|c| c.to_string()));
        }

        let mut interactions = Vec::new();
        for spec in &config.interactions {
            let position = |name: &str| {
                columns
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))
            };
            let pair = (position(&spec.left)?, position(&spec.right)?);
            columns.push(interaction_column(&spec.left, &spec.right));
            interactions.push(pair);
        }

        for (i, column) in columns.iter().enumerate() {
            if columns[..i].contains(column) {
                return Err(ForecastError::InvalidConfig(format!(
                    "feature column '{}' produced twice",
                    column
                )));
            }
        }

        let offset = FixedOffset::east_opt(config.utc_offset_minutes * 60).ok_or_else(|| {
            ForecastError::InvalidConfig(format!(
                "invalid utc offset: {} minutes",
                config.utc_offset_minutes
            ))
        })?;

        let history_len = [
            config.max_lag() + 1,
            config.max_rolling_window(),
            if close_change.is_some() { 2 } else { 1 },
        ]
        .into_iter()
        .max()
        .unwrap_or(1);

        Ok(Self {
            base_columns,
            columns,
            lags,
            rolling,
            close_change,
            include_calendar: config.include_calendar,
            interactions,
            offset,
            history_len,
        })
    }

    pub fn base_columns(&self) -> &[String] {
        &self.base_columns
    }

    /// Every output column, base columns first.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Base rows (current one included) needed to fill every derived column.
    pub fn history_len(&self) -> usize {
        self.history_len
    }

    /// Calendar date of `timestamp` in the configured local offset.
    pub fn local_date(&self, timestamp: i64) -> Option<NaiveDate> {
        Utc.timestamp_millis_opt(timestamp)
            .single()
            .map(|dt| dt.with_timezone(&self.offset).date_naive())
    }

    /// First row index at which each derived column can be defined, given the
    /// first defined index of every base column.
    pub fn first_defined(&self, base_starts: &[usize]) -> Vec<usize> {
        let mut starts = base_starts.to_vec();
        starts.extend(self.lags.iter().map(|l| base_starts[l.base] + l.lag));
        starts.extend(
            self.rolling
                .iter()
                .map(|r| base_starts[r.base] + r.window - 1),
        );
        if let Some(close) = self.close_change {
            starts.push(base_starts[close] + 1);
        }
        if self.include_calendar {
            starts.extend([0, 0, 0]);
        }
        for &(a, b) in &self.interactions {
            let start = starts[a].max(starts[b]);
            starts.push(start);
        }
        starts
    }

    /// Full feature row for the last entry of `history`.
    ///
    /// `history` holds base rows in time order, oldest first; only its last
    /// [`history_len`](Self::history_len) rows are read. Columns whose window
    /// reaches past the start of `history` come out as `NaN`.
    pub fn derive(&self, history: &[Vec<f64>], timestamp: i64) -> Result<Vec<f64>, ForecastError> {
        let n = history.len();
        let current = history.last().ok_or(ForecastError::InsufficientHistory {
            required: 1,
            available: 0,
        })?;
        if current.len() != self.base_columns.len() {
            return Err(ForecastError::InvalidConfig(format!(
                "base row has {} values, expected {}",
                current.len(),
                self.base_columns.len()
            )));
        }

        let mut row = Vec::with_capacity(self.columns.len());
        row.extend_from_slice(current);

        for lag in &self.lags {
            row.push(if n > lag.lag {
                history[n - 1 - lag.lag][lag.base]
            } else {
                f64::NAN
            });
        }

        for spec in &self.rolling {
            if n < spec.window {
                row.push(f64::NAN);
                continue;
            }
            let window: Vec<f64> = history[n - spec.window..]
                .iter()
                .map(|r| r[spec.base])
                .collect();
            let data = Data::new(window);
            let value = match spec.stat {
                RollingStat::Mean => data.mean(),
                RollingStat::Std => data.std_dev(),
            };
            row.push(value.unwrap_or(f64::NAN));
        }

        if let Some(close) = self.close_change {
            row.push(if n >= 2 {
                pct_change(current[close], history[n - 2][close])
            } else {
                f64::NAN
            });
        }

        if self.include_calendar {
            match Utc.timestamp_millis_opt(timestamp).single() {
                Some(dt) => {
                    let local = dt.with_timezone(&self.offset);
                    row.push(local.hour() as f64);
                    row.push(local.weekday().num_days_from_monday() as f64);
                    row.push(local.month() as f64);
                }
                None => row.extend([f64::NAN, f64::NAN, f64::NAN]),
            }
        }

        for &(a, b) in &self.interactions {
            let value = row[a] * row[b];
            row.push(value);
        }

        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InteractionSpec, RollingSpec};

    fn base() -> Vec<String> {
        ["open", "high", "low", "close", "volume", "rsi", "sentiment"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn config() -> FeatureConfig {
        FeatureConfig {
            include_sentiment: true,
            lag_columns: vec!["close".into(), "rsi".into()],
            lags: vec![1, 2],
            rolling: vec![
                RollingSpec::new("close", 3, RollingStat::Mean),
                RollingSpec::new("close", 3, RollingStat::Std),
            ],
            include_close_change_pct: true,
            include_calendar: true,
            interactions: vec![InteractionSpec::new("rsi", "sentiment")],
            ..FeatureConfig::minimal()
        }
    }

    fn row(close: f64, rsi: f64, sentiment: f64) -> Vec<f64> {
        vec![close, close, close, close, 10.0, rsi, sentiment]
    }

    #[test]
    fn test_column_order() {
        let deriver = FeatureDeriver::new(base(), &config()).unwrap();
        let derived: Vec<&str> = deriver.columns()[7..].iter().map(|s| s.as_str()).collect();
        assert_eq!(
            derived,
            vec![
                "close_lag1",
                "close_lag2",
                "rsi_lag1",
                "rsi_lag2",
                "close_roll_mean3",
                "close_roll_std3",
                "close_change_pct",
                "hour",
                "weekday",
                "month",
                "rsi_sentiment",
            ]
        );
        assert_eq!(deriver.history_len(), 3);
    }

    #[test]
    fn test_derive_values() {
        let deriver = FeatureDeriver::new(base(), &config()).unwrap();
        let history = vec![row(100.0, 40.0, 0.0), row(102.0, 50.0, 0.0), row(104.0, 60.0, 0.5)];
        // 2024-03-15 (Friday) 14:30 UTC
        let ts = 1_710_513_000_000;
        let out = deriver.derive(&history, ts).unwrap();
        let get = |name: &str| out[deriver.columns().iter().position(|c| c == name).unwrap()];

        assert_eq!(get("close_lag1"), 102.0);
        assert_eq!(get("close_lag2"), 100.0);
        assert_eq!(get("rsi_lag1"), 50.0);
        assert!((get("close_roll_mean3") - 102.0).abs() < 1e-12);
        assert!((get("close_roll_std3") - 2.0).abs() < 1e-12);
        assert!((get("close_change_pct") - 2.0 / 102.0).abs() < 1e-12);
        assert_eq!(get("hour"), 14.0);
        assert_eq!(get("weekday"), 4.0);
        assert_eq!(get("month"), 3.0);
        assert!((get("rsi_sentiment") - 30.0).abs() < 1e-12);
    }

    #[test]
    fn test_short_history_gives_nan() {
        let deriver = FeatureDeriver::new(base(), &config()).unwrap();
        let out = deriver.derive(&[row(100.0, 40.0, 0.0)], 0).unwrap();
        let idx = |name: &str| deriver.columns().iter().position(|c| c == name).unwrap();

        assert!(out[idx("close_lag1")].is_nan());
        assert!(out[idx("close_roll_mean3")].is_nan());
        assert!(out[idx("close_change_pct")].is_nan());
        assert_eq!(out[idx("close")], 100.0);
    }

    #[test]
    fn test_close_change_guard_on_zero_previous() {
        let deriver = FeatureDeriver::new(base(), &config()).unwrap();
        let out = deriver
            .derive(&[row(0.0, 40.0, 0.0), row(5.0, 40.0, 0.0)], 0)
            .unwrap();
        let idx = deriver
            .columns()
            .iter()
            .position(|c| c == "close_change_pct")
            .unwrap();
        assert_eq!(out[idx], 0.0);
        assert_eq!(pct_change(5.0, 0.0), 0.0);
    }

    #[test]
    fn test_utc_offset_shifts_calendar() {
        let config = FeatureConfig {
            include_calendar: true,
            utc_offset_minutes: 330,
            ..FeatureConfig::minimal()
        };
        let deriver = FeatureDeriver::new(base(), &config).unwrap();
        // 2024-03-15 20:00 UTC is 2024-03-16 01:30 at +05:30
        let ts = 1_710_532_800_000;
        let out = deriver.derive(&[row(1.0, 1.0, 0.0)], ts).unwrap();

        assert_eq!(&out[7..], &[1.0, 5.0, 3.0]);
        assert_eq!(
            deriver.local_date(ts),
            NaiveDate::from_ymd_opt(2024, 3, 16)
        );
    }

    #[test]
    fn test_first_defined() {
        let deriver = FeatureDeriver::new(base(), &config()).unwrap();
        // rsi undefined for the first 14 rows
        let starts = deriver.first_defined(&[0, 0, 0, 0, 0, 14, 0]);
        let at = |name: &str| starts[deriver.columns().iter().position(|c| c == name).unwrap()];

        assert_eq!(at("close_lag2"), 2);
        assert_eq!(at("rsi_lag2"), 16);
        assert_eq!(at("close_roll_std3"), 2);
        assert_eq!(at("rsi_sentiment"), 14);
        assert_eq!(starts.iter().max(), Some(&16));
    }

    #[test]
    fn test_unknown_lag_column() {
        let config = FeatureConfig {
            lag_columns: vec!["vwap".into()],
            lags: vec![1],
            ..FeatureConfig::minimal()
        };
        assert_eq!(
            FeatureDeriver::new(base(), &config).unwrap_err(),
            ForecastError::UnknownColumn("vwap".into())
        );
    }
}
