use crate::domain::errors::ForecastError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScalerKind {
    /// Maps the training range of each column onto [0, 1].
    #[default]
    MinMax,
    /// Zero mean, unit (population) variance over the training partition.
    Standard,
}

impl FromStr for ScalerKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "minmax" | "min_max" => Ok(ScalerKind::MinMax),
            "standard" | "zscore" => Ok(ScalerKind::Standard),
            _ => Err(ForecastError::InvalidConfig(format!(
                "unknown scaler '{}', expected 'min_max' or 'standard'",
                s
            ))),
        }
    }
}

impl fmt::Display for ScalerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScalerKind::MinMax => write!(f, "min_max"),
            ScalerKind::Standard => write!(f, "standard"),
        }
    }
}

/// Per-column affine parameters: `scaled = (x - offset) / scale`.
///
/// For min-max, `offset` is the column minimum and `scale` its range; for
/// standardization they are the mean and population standard deviation.
/// Zero-width columns get `scale = 1.0`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParams {
    pub kind: ScalerKind,
    pub columns: Vec<String>,
    pub offsets: Vec<f64>,
    pub scales: Vec<f64>,
}

impl ScalerParams {
    pub fn validate(&self) -> Result<(), ForecastError> {
        let n = self.columns.len();
        if self.offsets.len() != n || self.scales.len() != n {
            return Err(ForecastError::InvalidConfig(format!(
                "scaler params cover {} columns but hold {} offsets and {} scales",
                n,
                self.offsets.len(),
                self.scales.len()
            )));
        }
        if let Some(i) = self
            .offsets
            .iter()
            .zip(&self.scales)
            .position(|(o, s)| !o.is_finite() || !s.is_finite() || *s == 0.0)
        {
            return Err(ForecastError::UndefinedValue {
                column: self.columns[i].clone(),
                row: 0,
            });
        }
        Ok(())
    }
}
