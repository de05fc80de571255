//! Configuration module for candlecast.
//!
//! Every engine component receives its settings explicitly from an
//! [`EngineConfig`]; nothing below this module reads the environment.
//! Configs come from defaults, `CANDLECAST_*` environment variables or a TOML file.

mod feature_config;
mod forecast_config;
mod indicator_config;

pub use feature_config::{FeatureConfig, InteractionSpec, RollingSpec, RollingStat};
pub use forecast_config::{ForecastConfig, SplitConfig};
pub use indicator_config::IndicatorConfig;

use crate::domain::errors::ForecastError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::feature_schema::{CLOSE, HIGH, LOW, OPEN, SENTIMENT, VOLUME};
use crate::domain::ml::scaling::ScalerKind;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

/// Full engine configuration.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub timeframe: Timeframe,
    pub indicators: IndicatorConfig,
    pub features: FeatureConfig,
    pub scaler: ScalerKind,
    pub split: SplitConfig,
    pub forecast: ForecastConfig,
}

impl EngineConfig {
    /// Defaults overridden by `CANDLECAST_*` environment variables.
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let timeframe = env::var("CANDLECAST_TIMEFRAME")
            .unwrap_or_else(|_| defaults.timeframe.to_string())
            .parse::<Timeframe>()
            .context("Failed to parse CANDLECAST_TIMEFRAME")?;

        let scaler = env::var("CANDLECAST_SCALER")
            .unwrap_or_else(|_| defaults.scaler.to_string())
            .parse::<ScalerKind>()
            .context("Failed to parse CANDLECAST_SCALER")?;

        let targets = match env::var("CANDLECAST_TARGETS") {
            Ok(list) => list
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            Err(_) => defaults.forecast.targets.clone(),
        };

        let config = Self {
            timeframe,
            indicators: defaults.indicators.clone(),
            features: FeatureConfig {
                utc_offset_minutes: Self::parse_i32(
                    "CANDLECAST_UTC_OFFSET_MINUTES",
                    defaults.features.utc_offset_minutes,
                )?,
                ..defaults.features.clone()
            },
            scaler,
            split: SplitConfig {
                train_fraction: Self::parse_f64(
                    "CANDLECAST_TRAIN_FRACTION",
                    defaults.split.train_fraction,
                )?,
                n_folds: Self::parse_usize("CANDLECAST_FOLDS", defaults.split.n_folds)?,
                gap: Self::parse_usize("CANDLECAST_GAP", defaults.split.gap)?,
            },
            forecast: ForecastConfig {
                lookback: Self::parse_usize("CANDLECAST_LOOKBACK", defaults.forecast.lookback)?,
                horizon: Self::parse_usize("CANDLECAST_HORIZON", defaults.forecast.horizon)?,
                n_future_steps: Self::parse_usize(
                    "CANDLECAST_FORECAST_STEPS",
                    defaults.forecast.n_future_steps,
                )?,
                targets,
            },
        };

        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content).context("Failed to parse engine config TOML")?;
        config.validate().context("Invalid engine configuration")?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    /// Raw columns of the feature table before any derivation:
    /// OHLCV, the selected indicators, then sentiment.
    pub fn base_columns(&self) -> Vec<String> {
        base_columns(&self.indicators, &self.features)
    }

    /// Rejects impossible settings before any computation.
    ///
    /// References to derived columns (interaction operands, excluded inputs)
    /// are resolved when the feature deriver is built.
    pub fn validate(&self) -> Result<(), ForecastError> {
        self.indicators.validate()?;
        self.features.validate()?;
        self.split.validate()?;
        self.forecast.validate()?;

        let base = self.base_columns();
        let must_be_base = self
            .features
            .lag_columns
            .iter()
            .chain(self.features.rolling.iter().map(|r| &r.column))
            .chain(self.features.zero_fill_columns.iter())
            .chain(self.forecast.targets.iter());
        for column in must_be_base {
            if !base.contains(column) {
                return Err(ForecastError::UnknownColumn(column.clone()));
            }
        }
        Ok(())
    }

    fn parse_usize(key: &str, default: usize) -> Result<usize> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<usize>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_f64(key: &str, default: f64) -> Result<f64> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<f64>()
            .context(format!("Failed to parse {}", key))
    }

    fn parse_i32(key: &str, default: i32) -> Result<i32> {
        env::var(key)
            .unwrap_or_else(|_| default.to_string())
            .parse::<i32>()
            .context(format!("Failed to parse {}", key))
    }
}

/// OHLCV, the selected indicator columns, then sentiment when enabled.
pub fn base_columns(indicators: &IndicatorConfig, features: &FeatureConfig) -> Vec<String> {
    let mut columns: Vec<String> = [OPEN, HIGH, LOW, CLOSE, VOLUME]
        .iter()
        .map(|c| c.to_string())
        .collect();
    columns.extend(indicators.column_names());
    if features.include_sentiment {
        columns.push(SENTIMENT.to_string());
    }
    columns
}
