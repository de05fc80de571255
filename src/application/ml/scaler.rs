use crate::domain::errors::{ForecastError, ensure_strictly_increasing};
use crate::domain::ml::feature_frame::FeatureFrame;
use crate::domain::ml::scaling::{ScalerKind, ScalerParams};
use statrs::statistics::Statistics;
use tracing::info;

/// Rows explicitly marked as the training partition.
///
/// Only [`TemporalSplitter`](super::temporal_splitter::TemporalSplitter) can
/// create one, which is what keeps test or forecast rows out of a scaler fit.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingPartition {
    frame: FeatureFrame,
}

impl TrainingPartition {
    pub(crate) fn new(frame: FeatureFrame) -> Self {
        Self { frame }
    }

    pub fn frame(&self) -> &FeatureFrame {
        &self.frame
    }

    pub fn len(&self) -> usize {
        self.frame.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frame.is_empty()
    }
}

/// Feature values expressed in the space of a fitted scaler.
#[derive(Debug, Clone, PartialEq)]
pub struct ScaledMatrix(FeatureFrame);

impl ScaledMatrix {
    pub fn frame(&self) -> &FeatureFrame {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn columns(&self) -> &[String] {
        self.0.columns()
    }

    pub fn timestamps(&self) -> &[i64] {
        self.0.timestamps()
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        self.0.rows()
    }

    pub fn slice(&self, range: std::ops::Range<usize>) -> ScaledMatrix {
        ScaledMatrix(self.0.slice(range))
    }
}

/// Scaler parameters frozen at fit time.
///
/// There is no way to refit or mutate a `FittedScaler`; a new fit produces a
/// new value.
#[derive(Debug, Clone, PartialEq)]
pub struct FittedScaler {
    params: ScalerParams,
}

impl FittedScaler {
    /// Fits per-column parameters on the training partition.
    pub fn fit(kind: ScalerKind, partition: &TrainingPartition) -> Result<Self, ForecastError> {
        let frame = partition.frame();
        if frame.is_empty() {
            return Err(ForecastError::InsufficientHistory {
                required: 1,
                available: 0,
            });
        }
        ensure_strictly_increasing(frame.timestamps(), "scaler fit")?;
        frame.ensure_defined()?;

        let mut offsets = Vec::with_capacity(frame.width());
        let mut scales = Vec::with_capacity(frame.width());

        for idx in 0..frame.width() {
            let column: Vec<f64> = frame.rows().iter().map(|r| r[idx]).collect();
            let (offset, scale) = match kind {
                ScalerKind::MinMax => {
                    let min = column.iter().copied().fold(f64::INFINITY, f64::min);
                    let max = column.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                    (min, max - min)
                }
                ScalerKind::Standard => {
                    let mean = column.iter().mean();
                    let std = column.iter().population_std_dev();
                    (mean, std)
                }
            };
            offsets.push(offset);
            scales.push(if scale > 0.0 && scale.is_finite() {
                scale
            } else {
                1.0
            });
        }

        info!(
            "Scaler: fitted {} over {} columns x {} training rows",
            kind,
            frame.width(),
            frame.len()
        );

        Ok(Self {
            params: ScalerParams {
                kind,
                columns: frame.columns().to_vec(),
                offsets,
                scales,
            },
        })
    }

    /// Restores a scaler from persisted parameters.
    pub fn from_params(params: ScalerParams) -> Result<Self, ForecastError> {
        params.validate()?;
        Ok(Self { params })
    }

    pub fn params(&self) -> &ScalerParams {
        &self.params
    }

    pub fn kind(&self) -> ScalerKind {
        self.params.kind
    }

    pub fn columns(&self) -> &[String] {
        &self.params.columns
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ForecastError> {
        self.params
            .columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))
    }

    pub fn scale_value(&self, column: usize, value: f64) -> f64 {
        (value - self.params.offsets[column]) / self.params.scales[column]
    }

    pub fn unscale_value(&self, column: usize, value: f64) -> f64 {
        value * self.params.scales[column] + self.params.offsets[column]
    }

    /// Scales one full-width row laid out like [`columns`](Self::columns).
    pub fn transform_row(&self, row: &[f64]) -> Result<Vec<f64>, ForecastError> {
        self.ensure_width(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(i, &v)| self.scale_value(i, v))
            .collect())
    }

    pub fn inverse_row(&self, row: &[f64]) -> Result<Vec<f64>, ForecastError> {
        self.ensure_width(row.len())?;
        Ok(row
            .iter()
            .enumerate()
            .map(|(i, &v)| self.unscale_value(i, v))
            .collect())
    }

    /// Applies the stored parameters; the frame must have the fitted columns
    /// in the fitted order.
    pub fn transform(&self, frame: &FeatureFrame) -> Result<ScaledMatrix, ForecastError> {
        if frame.columns() != self.columns() {
            return Err(ForecastError::schema_mismatch(self.columns(), frame.columns()));
        }
        let mut scaled = FeatureFrame::with_capacity(frame.columns().to_vec(), frame.len());
        for (row, &timestamp) in frame.rows().iter().zip(frame.timestamps()) {
            scaled.push_row(timestamp, self.transform_row(row)?)?;
        }
        Ok(ScaledMatrix(scaled))
    }

    pub fn inverse_transform(&self, matrix: &ScaledMatrix) -> Result<FeatureFrame, ForecastError> {
        if matrix.columns() != self.columns() {
            return Err(ForecastError::schema_mismatch(self.columns(), matrix.columns()));
        }
        let mut frame = FeatureFrame::with_capacity(matrix.columns().to_vec(), matrix.len());
        for (row, &timestamp) in matrix.rows().iter().zip(matrix.timestamps()) {
            frame.push_row(timestamp, self.inverse_row(row)?)?;
        }
        Ok(frame)
    }

    fn ensure_width(&self, width: usize) -> Result<(), ForecastError> {
        if width != self.params.columns.len() {
            return Err(ForecastError::InvalidConfig(format!(
                "row has {} values, scaler was fitted on {} columns",
                width,
                self.params.columns.len()
            )));
        }
        Ok(())
    }
}
