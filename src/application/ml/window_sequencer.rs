use crate::application::ml::scaler::ScaledMatrix;
use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_schema::FeatureSchema;

/// `lookback` consecutive input rows plus, for training, the `horizon` target
/// rows that follow them.
#[derive(Debug, Clone, PartialEq)]
pub struct Window {
    /// Index of the first input row in the source matrix.
    pub start: usize,
    pub inputs: Vec<Vec<f64>>,
    pub targets: Vec<Vec<f64>>,
    /// Timestamps of the target rows.
    pub target_timestamps: Vec<i64>,
}

/// Slices a scaled matrix into contiguous lookback windows.
///
/// Window `i` covers input rows `[i, i + L)` and target rows
/// `[i + L, i + L + H)`. With `L = 1` every row is its own window, which is
/// the tabular case.
#[derive(Debug, Clone)]
pub struct WindowSequencer {
    lookback: usize,
    horizon: usize,
    input_indices: Vec<usize>,
    target_indices: Vec<usize>,
}

impl WindowSequencer {
    /// `horizon` may be 0 to produce inference windows without targets.
    pub fn new(
        lookback: usize,
        horizon: usize,
        inputs: &FeatureSchema,
        targets: &[String],
        columns: &[String],
    ) -> Result<Self, ForecastError> {
        if lookback == 0 {
            return Err(ForecastError::InvalidConfig(
                "window lookback must be >= 1".to_string(),
            ));
        }
        Ok(Self {
            lookback,
            horizon,
            input_indices: inputs.indices_in(columns)?,
            target_indices: FeatureSchema::new(targets.to_vec()).indices_in(columns)?,
        })
    }

    pub fn lookback(&self) -> usize {
        self.lookback
    }

    pub fn horizon(&self) -> usize {
        self.horizon
    }

    /// `N - L - H + 1`, or 0 when `N < L + H`.
    pub fn window_count(&self, n: usize) -> usize {
        (n + 1).saturating_sub(self.lookback + self.horizon)
    }

    pub fn windows(&self, matrix: &ScaledMatrix) -> Result<Vec<Window>, ForecastError> {
        let n = matrix.len();
        let required = self.lookback + self.horizon;
        if n < required {
            return Err(ForecastError::InsufficientHistory {
                required,
                available: n,
            });
        }

        let rows = matrix.rows();
        let timestamps = matrix.timestamps();
        Ok((0..self.window_count(n))
            .map(|i| {
                let target_range = i + self.lookback..i + self.lookback + self.horizon;
                Window {
                    start: i,
                    inputs: rows[i..i + self.lookback]
                        .iter()
                        .map(|r| select(r, &self.input_indices))
                        .collect(),
                    targets: rows[target_range.clone()]
                        .iter()
                        .map(|r| select(r, &self.target_indices))
                        .collect(),
                    target_timestamps: timestamps[target_range].to_vec(),
                }
            })
            .collect())
    }

    /// Input columns of every row, unwindowed.
    pub fn input_rows(&self, matrix: &ScaledMatrix) -> Vec<Vec<f64>> {
        matrix
            .rows()
            .iter()
            .map(|r| select(r, &self.input_indices))
            .collect()
    }
}

fn select(row: &[f64], indices: &[usize]) -> Vec<f64> {
    indices.iter().map(|&i| row[i]).collect()
}
