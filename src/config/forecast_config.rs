use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_schema::OHLC;
use serde::{Deserialize, Serialize};

/// Chronological train/test geometry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitConfig {
    /// Fraction of rows (from the start) used for training.
    pub train_fraction: f64,
    /// Number of walk-forward folds for evaluation.
    pub n_folds: usize,
    /// Rows purged between a training block and the block after it.
    pub gap: usize,
}

impl Default for SplitConfig {
    fn default() -> Self {
        Self {
            train_fraction: 0.9,
            n_folds: 3,
            gap: 0,
        }
    }
}

impl SplitConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if !(self.train_fraction > 0.0 && self.train_fraction < 1.0) {
            return Err(ForecastError::InvalidConfig(format!(
                "train_fraction must be within (0, 1), got {}",
                self.train_fraction
            )));
        }
        if self.n_folds == 0 {
            return Err(ForecastError::InvalidConfig(
                "n_folds must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Window and rollout settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ForecastConfig {
    /// Rows per input window for sequence predictors (L).
    pub lookback: usize,
    /// Rows produced per predictor call when training sequence targets (H).
    pub horizon: usize,
    /// Default number of future steps to generate.
    pub n_future_steps: usize,
    /// Columns the predictor outputs, in output order.
    pub targets: Vec<String>,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            lookback: 10,
            horizon: 1,
            n_future_steps: 10,
            targets: OHLC.iter().map(|c| c.to_string()).collect(),
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.lookback == 0 {
            return Err(ForecastError::InvalidConfig(
                "lookback must be >= 1".to_string(),
            ));
        }
        if self.horizon == 0 {
            return Err(ForecastError::InvalidConfig(
                "horizon must be >= 1".to_string(),
            ));
        }
        if self.targets.is_empty() {
            return Err(ForecastError::InvalidConfig(
                "at least one target column is required".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_fraction_bounds() {
        for fraction in [0.0, 1.0, -0.2, f64::NAN] {
            let config = SplitConfig {
                train_fraction: fraction,
                ..SplitConfig::default()
            };
            assert!(config.validate().is_err(), "fraction {} accepted", fraction);
        }
        assert!(SplitConfig::default().validate().is_ok());
    }

    #[test]
    fn test_forecast_defaults_target_ohlc() {
        let config = ForecastConfig::default();
        assert_eq!(config.targets, vec!["open", "high", "low", "close"]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_horizon_rejected() {
        let config = ForecastConfig {
            horizon: 0,
            ..ForecastConfig::default()
        };
        assert!(config.validate().is_err());
    }
}
