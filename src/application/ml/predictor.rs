use crate::domain::errors::ForecastError;
use crate::domain::ml::predictor_spec::{PredictorKind, PredictorSpec};

/// What a predictor receives for one call, already in scaled space and
/// restricted to its input schema.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PredictorInput<'a> {
    /// One feature row (tabular predictors).
    Row(&'a [f64]),
    /// `lookback` consecutive feature rows, oldest first (sequence predictors).
    Window(&'a [Vec<f64>]),
}

impl<'a> PredictorInput<'a> {
    /// Most recent feature row.
    pub fn last_row(&self) -> Option<&'a [f64]> {
        match self {
            PredictorInput::Row(row) => Some(row),
            PredictorInput::Window(rows) => rows.last().map(|r| r.as_slice()),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            PredictorInput::Row(_) => 1,
            PredictorInput::Window(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Interface for trained forecasting models.
///
/// Implementations are stateless per call: everything a prediction depends on
/// arrives through `input`.
pub trait Predictor: Send + Sync {
    /// Kind, input schema and target columns the model was trained with.
    fn spec(&self) -> &PredictorSpec;

    /// Predicts the next `horizon` steps; one row per step, one value per
    /// target column, in scaled units.
    fn predict(&self, input: &PredictorInput) -> Result<Vec<Vec<f64>>, String>;

    /// Get model name/type
    fn name(&self) -> &str;

    /// Get model version/id
    fn version(&self) -> &str;
}

/// Turns the forecaster's buffer of input rows into the shape a predictor
/// kind expects. The rollout loop never looks at predictor kinds itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputShape {
    Row,
    Window { lookback: usize },
}

impl InputShape {
    pub fn for_kind(kind: PredictorKind) -> Self {
        match kind {
            PredictorKind::TabularSingle | PredictorKind::TabularMulti => InputShape::Row,
            PredictorKind::SequenceToSequence { lookback, .. } => InputShape::Window { lookback },
        }
    }

    /// Rows the buffer must hold.
    pub fn rows_needed(&self) -> usize {
        match self {
            InputShape::Row => 1,
            InputShape::Window { lookback } => *lookback,
        }
    }

    /// Shapes the tail of `buffer`; fails if the buffer is too short.
    pub fn shape<'a>(&self, buffer: &'a [Vec<f64>]) -> Result<PredictorInput<'a>, ForecastError> {
        let needed = self.rows_needed();
        if buffer.len() < needed {
            return Err(ForecastError::InsufficientHistory {
                required: needed,
                available: buffer.len(),
            });
        }
        let tail = &buffer[buffer.len() - needed..];
        Ok(match self {
            InputShape::Row => PredictorInput::Row(&tail[0]),
            InputShape::Window { .. } => PredictorInput::Window(tail),
        })
    }
}

/// Checks a prediction against the declared horizon and target count.
pub fn validate_output(spec: &PredictorSpec, output: &[Vec<f64>]) -> Result<(), String> {
    let horizon = spec.kind.horizon();
    if output.len() != horizon {
        return Err(format!(
            "expected {} step(s), got {}",
            horizon,
            output.len()
        ));
    }
    for (step, row) in output.iter().enumerate() {
        if row.len() != spec.targets.len() {
            return Err(format!(
                "step {} has {} value(s), expected {}",
                step,
                row.len(),
                spec.targets.len()
            ));
        }
        if let Some(v) = row.iter().find(|v| !v.is_finite()) {
            return Err(format!("step {} contains non-finite value {}", step, v));
        }
    }
    Ok(())
}

/// Naive persistence model: predicts that every target keeps its most recent
/// input value. Serves as the baseline any trained model has to beat.
pub struct LastValuePredictor {
    spec: PredictorSpec,
    target_indices: Vec<usize>,
}

impl LastValuePredictor {
    /// Every target must also be an input column.
    pub fn new(spec: PredictorSpec) -> Result<Self, ForecastError> {
        spec.validate()?;
        let target_indices = spec
            .targets
            .iter()
            .map(|t| {
                spec.inputs
                    .index_of(t)
                    .ok_or_else(|| ForecastError::UnknownColumn(t.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            spec,
            target_indices,
        })
    }
}

impl Predictor for LastValuePredictor {
    fn spec(&self) -> &PredictorSpec {
        &self.spec
    }

    fn predict(&self, input: &PredictorInput) -> Result<Vec<Vec<f64>>, String> {
        let last = input.last_row().ok_or("Empty input")?;
        let row: Vec<f64> = self
            .target_indices
            .iter()
            .map(|&i| last.get(i).copied().ok_or("Input row shorter than schema"))
            .collect::<Result<_, _>>()?;
        Ok(vec![row; self.spec.kind.horizon()])
    }

    fn name(&self) -> &str {
        "Last Value"
    }

    fn version(&self) -> &str {
        "v1.0"
    }
}
