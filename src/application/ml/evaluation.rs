use crate::application::ml::predictor::{InputShape, Predictor, validate_output};
use crate::application::ml::scaler::FittedScaler;
use crate::application::ml::temporal_splitter::Fold;
use crate::application::ml::window_sequencer::{Window, WindowSequencer};
use crate::domain::errors::ForecastError;
use crate::domain::ml::scaling::ScalerKind;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

/// Error statistics for one target column, in original units.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegressionMetrics {
    pub count: usize,
    pub mae: f64,
    pub rmse: f64,
    /// 0 when the actual values have no variance.
    pub r2: f64,
    /// Mean absolute percentage error over rows with a non-zero actual value.
    pub mape: f64,
}

impl RegressionMetrics {
    /// `None` for empty input or mismatched lengths.
    pub fn compute(predicted: &[f64], actual: &[f64]) -> Option<Self> {
        if predicted.is_empty() || predicted.len() != actual.len() {
            return None;
        }
        let n = predicted.len() as f64;

        let sq_err: f64 = predicted
            .iter()
            .zip(actual)
            .map(|(p, t)| (p - t).powi(2))
            .sum();
        let mse = sq_err / n;
        let mae = predicted
            .iter()
            .zip(actual)
            .map(|(p, t)| (p - t).abs())
            .sum::<f64>()
            / n;

        let mean_y = actual.iter().sum::<f64>() / n;
        let var_y = actual.iter().map(|t| (t - mean_y).powi(2)).sum::<f64>() / n;
        let r2 = if var_y > 0.0 { 1.0 - mse / var_y } else { 0.0 };

        let pct: Vec<f64> = predicted
            .iter()
            .zip(actual)
            .filter(|(_, t)| **t != 0.0)
            .map(|(p, t)| ((p - t) / t).abs())
            .collect();
        let mape = if pct.is_empty() {
            0.0
        } else {
            pct.iter().sum::<f64>() / pct.len() as f64 * 100.0
        };

        Some(Self {
            count: predicted.len(),
            mae,
            rmse: mse.sqrt(),
            r2,
            mape,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetMetrics {
    pub field: String,
    pub metrics: RegressionMetrics,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FoldReport {
    pub index: usize,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub targets: Vec<TargetMetrics>,
}

impl FoldReport {
    pub fn rmse(&self, field: &str) -> Option<f64> {
        self.targets
            .iter()
            .find(|t| t.field == field)
            .map(|t| t.metrics.rmse)
    }
}

/// Scores `predictor` on every window, comparing each predicted step with the
/// window's target rows after inverse scaling.
///
/// Windows must come from a sequencer built with the predictor's inputs and
/// targets.
pub fn evaluate_windows(
    predictor: &dyn Predictor,
    windows: &[Window],
    scaler: &FittedScaler,
) -> Result<Vec<TargetMetrics>, ForecastError> {
    let spec = predictor.spec();
    if windows.is_empty() {
        return Err(ForecastError::InvalidConfig(format!(
            "no windows to evaluate {} on",
            predictor.name()
        )));
    }
    let shape = InputShape::for_kind(spec.kind);
    let columns = spec
        .targets
        .iter()
        .map(|t| scaler.column_index(t))
        .collect::<Result<Vec<_>, _>>()?;
    let failure = |reason: String| ForecastError::PredictorFailure {
        predictor: predictor.name().to_string(),
        reason,
    };

    let mut predicted = vec![Vec::new(); columns.len()];
    let mut actual = vec![Vec::new(); columns.len()];

    for window in windows {
        let input = shape.shape(&window.inputs)?;
        let output = predictor.predict(&input).map_err(failure)?;
        validate_output(spec, &output).map_err(failure)?;

        for (step, truth) in output.iter().zip(&window.targets) {
            for (t, &col) in columns.iter().enumerate() {
                predicted[t].push(scaler.unscale_value(col, step[t]));
                actual[t].push(scaler.unscale_value(col, truth[t]));
            }
        }
    }

    spec.targets
        .iter()
        .enumerate()
        .map(|(t, field)| {
            RegressionMetrics::compute(&predicted[t], &actual[t])
                .map(|metrics| TargetMetrics {
                    field: field.clone(),
                    metrics,
                })
                .ok_or_else(|| {
                    ForecastError::InvalidConfig(format!("no predictions scored for {}", field))
                })
        })
        .collect()
}

/// Scores a read-only predictor on each walk-forward fold in parallel.
///
/// Every fold fits its own scaler on its training block only, so validation
/// statistics never leak into the scaling.
pub fn evaluate_folds(
    predictor: &dyn Predictor,
    folds: &[Fold],
    scaler_kind: ScalerKind,
    sequencer: &WindowSequencer,
) -> Result<Vec<FoldReport>, ForecastError> {
    let reports = folds
        .par_iter()
        .map(|fold| -> Result<FoldReport, ForecastError> {
            let scaler = FittedScaler::fit(scaler_kind, &fold.train)?;
            let scaled = scaler.transform(&fold.validation)?;
            let windows = sequencer.windows(&scaled)?;
            Ok(FoldReport {
                index: fold.index,
                train_rows: fold.train.len(),
                validation_rows: fold.validation.len(),
                targets: evaluate_windows(predictor, &windows, &scaler)?,
            })
        })
        .collect::<Result<Vec<_>, _>>()?;

    for report in &reports {
        for target in &report.targets {
            info!(
                "Fold {} '{}' (n={}): RMSE={:.6}, MAE={:.6}, R²={:.4}",
                report.index,
                target.field,
                target.metrics.count,
                target.metrics.rmse,
                target.metrics.mae,
                target.metrics.r2
            );
        }
    }
    Ok(reports)
}
