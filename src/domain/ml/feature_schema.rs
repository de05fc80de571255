use crate::domain::errors::ForecastError;
use serde::{Deserialize, Serialize};

pub const OPEN: &str = "open";
pub const HIGH: &str = "high";
pub const LOW: &str = "low";
pub const CLOSE: &str = "close";
pub const VOLUME: &str = "volume";
pub const SENTIMENT: &str = "sentiment";
pub const CLOSE_CHANGE_PCT: &str = "close_change_pct";
pub const HOUR: &str = "hour";
pub const WEEKDAY: &str = "weekday";
pub const MONTH: &str = "month";

/// Price fields in OHLC order.
pub const OHLC: &[&str] = &[OPEN, HIGH, LOW, CLOSE];

pub fn lag_column(column: &str, lag: usize) -> String {
    format!("{}_lag{}", column, lag)
}

pub fn target_column(field: &str) -> String {
    format!("{}_next", field)
}

pub fn interaction_column(left: &str, right: &str) -> String {
    format!("{}_{}", left, right)
}

/// Ordered list of feature names a predictor was trained on.
///
/// The order is part of the contract: a predictor fed the same numbers in a
/// different order produces garbage without any error, so the schema travels
/// with every trained model and is checked before the first prediction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureSchema {
    columns: Vec<String>,
}

impl FeatureSchema {
    pub fn new(columns: Vec<String>) -> Self {
        Self { columns }
    }

    pub fn from_names(names: &[&str]) -> Self {
        Self::new(names.iter().map(|n| n.to_string()).collect())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index_of(name).is_some()
    }

    /// Fails unless `actual` lists exactly the same columns in the same order.
    pub fn ensure_matches(&self, actual: &FeatureSchema) -> Result<(), ForecastError> {
        if self.columns != actual.columns {
            return Err(ForecastError::schema_mismatch(&self.columns, &actual.columns));
        }
        Ok(())
    }

    /// Positions of this schema's columns inside `available`.
    pub fn indices_in(&self, available: &[String]) -> Result<Vec<usize>, ForecastError> {
        self.columns
            .iter()
            .map(|name| {
                available
                    .iter()
                    .position(|c| c == name)
                    .ok_or_else(|| ForecastError::UnknownColumn(name.clone()))
            })
            .collect()
    }
}
