use crate::domain::errors::ForecastError;
use crate::domain::market::indicator_row::IndicatorColumn;
use serde::{Deserialize, Serialize};

/// Periods for the technical indicators and the columns that reach the
/// feature table.
///
/// Column names are fixed (`ema_50`, `rolling_high_252`, ...); changing a
/// period changes the values behind a name, not the name itself, so trained
/// schemas stay stable across tuning runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorConfig {
    pub rsi_period: usize,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
    pub ema_short: usize,
    pub ema_long: usize,
    pub volume_short: usize,
    pub volume_long: usize,
    pub high_window: usize,
    /// Window of the `rs_rating` rolling mean over `rs_line`.
    pub rs_window: usize,
    /// Body / range ratio at or below which a candle counts as a doji.
    pub doji_body_ratio: f64,
    /// Indicator columns included in the feature table, in this order.
    pub columns: Vec<IndicatorColumn>,
}

impl Default for IndicatorConfig {
    fn default() -> Self {
        Self {
            rsi_period: 14,
            macd_fast: 12,
            macd_slow: 26,
            macd_signal: 9,
            ema_short: 50,
            ema_long: 200,
            volume_short: 10,
            volume_long: 50,
            high_window: 252,
            rs_window: 20,
            doji_body_ratio: 0.1,
            columns: IndicatorColumn::ALL.to_vec(),
        }
    }
}

impl IndicatorConfig {
    /// Config that computes nothing beyond the raw candle columns.
    pub fn none() -> Self {
        Self {
            columns: Vec::new(),
            ..Self::default()
        }
    }

    /// Number of leading rows for which `column` is undefined.
    pub fn warmup(&self, column: IndicatorColumn) -> usize {
        match column {
            IndicatorColumn::Rsi => self.rsi_period,
            IndicatorColumn::Macd => self.macd_slow - 1,
            IndicatorColumn::MacdSignal | IndicatorColumn::MacdHist => {
                self.macd_slow + self.macd_signal - 2
            }
            IndicatorColumn::Ema50 => self.ema_short - 1,
            IndicatorColumn::Ema200 => self.ema_long - 1,
            IndicatorColumn::Doji => 0,
            IndicatorColumn::Engulfing => 1,
            IndicatorColumn::AvgVolume10 => self.volume_short - 1,
            IndicatorColumn::AvgVolume50 | IndicatorColumn::VolumeRatio => self.volume_long - 1,
            IndicatorColumn::RollingHigh252 | IndicatorColumn::DistanceFromHigh => {
                self.high_window - 1
            }
            IndicatorColumn::RsLine => 0,
            IndicatorColumn::RsRating => self.rs_window - 1,
            IndicatorColumn::MasterScore => self
                .rsi_period
                .max(self.rs_window - 1)
                .max(self.volume_long - 1),
        }
    }

    /// True when a selected column is relative to a benchmark index.
    pub fn needs_benchmark(&self) -> bool {
        self.columns.iter().any(|c| c.needs_benchmark())
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name().to_string()).collect()
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        let periods = [
            ("rsi_period", self.rsi_period),
            ("macd_fast", self.macd_fast),
            ("macd_slow", self.macd_slow),
            ("macd_signal", self.macd_signal),
            ("ema_short", self.ema_short),
            ("ema_long", self.ema_long),
            ("volume_short", self.volume_short),
            ("volume_long", self.volume_long),
            ("high_window", self.high_window),
            ("rs_window", self.rs_window),
        ];
        if let Some((name, _)) = periods.iter().find(|(_, p)| *p == 0) {
            return Err(ForecastError::InvalidConfig(format!("{} must be > 0", name)));
        }
        if self.macd_fast >= self.macd_slow {
            return Err(ForecastError::InvalidConfig(format!(
                "macd_fast ({}) must be below macd_slow ({})",
                self.macd_fast, self.macd_slow
            )));
        }
        if !(0.0..=1.0).contains(&self.doji_body_ratio) {
            return Err(ForecastError::InvalidConfig(format!(
                "doji_body_ratio must be within [0, 1], got {}",
                self.doji_body_ratio
            )));
        }
        for (i, column) in self.columns.iter().enumerate() {
            if self.columns[..i].contains(column) {
                return Err(ForecastError::InvalidConfig(format!(
                    "indicator column '{}' listed twice",
                    column
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_warmups() {
        let config = IndicatorConfig::default();
        assert_eq!(config.warmup(IndicatorColumn::Rsi), 14);
        assert_eq!(config.warmup(IndicatorColumn::Macd), 25);
        assert_eq!(config.warmup(IndicatorColumn::MacdSignal), 33);
        assert_eq!(config.warmup(IndicatorColumn::Ema200), 199);
        assert_eq!(config.warmup(IndicatorColumn::RollingHigh252), 251);
        assert_eq!(config.warmup(IndicatorColumn::Doji), 0);
        assert_eq!(config.warmup(IndicatorColumn::RsLine), 0);
        assert_eq!(config.warmup(IndicatorColumn::RsRating), 19);
        assert_eq!(config.warmup(IndicatorColumn::MasterScore), 49);
        assert!(!config.needs_benchmark());
    }

    #[test]
    fn test_validate_rejects_inverted_macd() {
        let config = IndicatorConfig {
            macd_fast: 26,
            macd_slow: 12,
            ..IndicatorConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_period() {
        let config = IndicatorConfig {
            high_window: 0,
            ..IndicatorConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ForecastError::InvalidConfig(msg)) if msg.contains("high_window")
        ));
    }

    #[test]
    fn test_validate_rejects_duplicate_column() {
        let config = IndicatorConfig {
            columns: vec![IndicatorColumn::Rsi, IndicatorColumn::Rsi],
            ..IndicatorConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
