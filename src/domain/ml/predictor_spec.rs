use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_schema::FeatureSchema;
use serde::{Deserialize, Serialize};

/// Capability of a trained predictor, fixed when the predictor is configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PredictorKind {
    /// One feature row in, one target value out.
    TabularSingle,
    /// One feature row in, one value per target column out.
    TabularMulti,
    /// `lookback` rows in, `horizon` rows of target values out.
    SequenceToSequence { lookback: usize, horizon: usize },
}

impl PredictorKind {
    /// Number of feature rows a single call consumes.
    pub fn lookback(&self) -> usize {
        match self {
            PredictorKind::TabularSingle | PredictorKind::TabularMulti => 1,
            PredictorKind::SequenceToSequence { lookback, .. } => *lookback,
        }
    }

    /// Number of future steps a single call produces.
    pub fn horizon(&self) -> usize {
        match self {
            PredictorKind::TabularSingle | PredictorKind::TabularMulti => 1,
            PredictorKind::SequenceToSequence { horizon, .. } => *horizon,
        }
    }

    pub fn is_tabular(&self) -> bool {
        !matches!(self, PredictorKind::SequenceToSequence { .. })
    }
}

/// Everything the engine must know about a trained predictor to drive it:
/// what kind it is, the exact input columns it was trained on and the
/// columns its outputs stand for (in the scaled space of those columns).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictorSpec {
    pub kind: PredictorKind,
    pub inputs: FeatureSchema,
    pub targets: Vec<String>,
}

impl PredictorSpec {
    pub fn new(kind: PredictorKind, inputs: FeatureSchema, targets: Vec<String>) -> Self {
        Self {
            kind,
            inputs,
            targets,
        }
    }

    pub fn validate(&self) -> Result<(), ForecastError> {
        if self.inputs.is_empty() {
            return Err(ForecastError::InvalidConfig(
                "predictor input schema is empty".to_string(),
            ));
        }
        if self.targets.is_empty() {
            return Err(ForecastError::InvalidConfig(
                "predictor has no target columns".to_string(),
            ));
        }
        match self.kind {
            PredictorKind::TabularSingle if self.targets.len() != 1 => {
                Err(ForecastError::InvalidConfig(format!(
                    "tabular single-target predictor declares {} targets",
                    self.targets.len()
                )))
            }
            PredictorKind::SequenceToSequence { lookback, horizon }
                if lookback == 0 || horizon == 0 =>
            {
                Err(ForecastError::InvalidConfig(format!(
                    "sequence predictor needs lookback and horizon >= 1 (got {}, {})",
                    lookback, horizon
                )))
            }
            _ => Ok(()),
        }
    }
}
