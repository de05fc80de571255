use super::predictor::{Predictor, PredictorInput};
use crate::domain::errors::ForecastError;
use crate::domain::ml::predictor_spec::{PredictorKind, PredictorSpec};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use smartcore::ensemble::random_forest_regressor::{
    RandomForestRegressor, RandomForestRegressorParameters,
};
use smartcore::linalg::basic::matrix::DenseMatrix;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::info;

type Forest = RandomForestRegressor<f64, f64, DenseMatrix<f64>, Vec<f64>>;

/// On-disk form: the spec travels with the forests so the input schema can be
/// checked before the first prediction.
#[derive(Serialize, Deserialize)]
struct SmartCoreModelFile {
    spec: PredictorSpec,
    forests: Vec<Forest>,
}

/// Random-forest regressors from `smartcore`, one per target column.
///
/// Tabular only: each call consumes a single feature row and predicts one step.
pub struct SmartCorePredictor {
    spec: PredictorSpec,
    forests: Vec<Forest>,
}

impl SmartCorePredictor {
    /// Trains one forest per target column on scaled rows.
    ///
    /// `targets[i][t]` is the value of target `t` for the step after `inputs[i]`.
    pub fn fit(
        spec: PredictorSpec,
        inputs: &[Vec<f64>],
        targets: &[Vec<f64>],
        params: RandomForestRegressorParameters,
    ) -> Result<Self, ForecastError> {
        spec.validate()?;
        if !spec.kind.is_tabular() {
            return Err(ForecastError::InvalidConfig(
                "random forest predictor supports tabular kinds only".to_string(),
            ));
        }
        if inputs.is_empty() || inputs.len() != targets.len() {
            return Err(ForecastError::InvalidConfig(format!(
                "{} input rows for {} target rows",
                inputs.len(),
                targets.len()
            )));
        }

        ensure_widths(inputs, spec.inputs.columns())?;
        ensure_widths(targets, &spec.targets)?;

        let failure = |reason: String| ForecastError::PredictorFailure {
            predictor: "SmartCore Random Forest".to_string(),
            reason,
        };

        let x = DenseMatrix::from_2d_vec(&inputs.to_vec())
            .map_err(|e| failure(format!("Matrix creation failed: {}", e)))?;

        let mut forests = Vec::with_capacity(spec.targets.len());
        for (t, name) in spec.targets.iter().enumerate() {
            let y: Vec<f64> = targets.iter().map(|row| row[t]).collect();
            let forest = RandomForestRegressor::fit(&x, &y, params.clone())
                .map_err(|e| failure(format!("Training '{}' failed: {}", name, e)))?;
            forests.push(forest);
        }

        info!(
            "SmartCorePredictor: trained {} forest(s) on {} rows x {} features",
            forests.len(),
            inputs.len(),
            spec.inputs.len()
        );
        Ok(Self { spec, forests })
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open model file {}", path.display()))?;
        let model: SmartCoreModelFile = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to deserialize model {}", path.display()))?;

        model.spec.validate()?;
        if model.forests.len() != model.spec.targets.len() {
            anyhow::bail!(
                "Model {} holds {} forests for {} targets",
                path.display(),
                model.forests.len(),
                model.spec.targets.len()
            );
        }

        info!("Successfully loaded ML model from {:?}", path);
        Ok(Self {
            spec: model.spec,
            forests: model.forests,
        })
    }

    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create model file {}", path.display()))?;
        let model = SmartCoreModelFileRef {
            spec: &self.spec,
            forests: &self.forests,
        };
        serde_json::to_writer(BufWriter::new(file), &model)
            .with_context(|| format!("Failed to serialize model to {}", path.display()))?;
        Ok(())
    }
}

#[derive(Serialize)]
struct SmartCoreModelFileRef<'a> {
    spec: &'a PredictorSpec,
    forests: &'a [Forest],
}

impl Predictor for SmartCorePredictor {
    fn spec(&self) -> &PredictorSpec {
        &self.spec
    }

    fn predict(&self, input: &PredictorInput) -> Result<Vec<Vec<f64>>, String> {
        let row = match input {
            PredictorInput::Row(row) => row.to_vec(),
            PredictorInput::Window(_) => {
                return Err("Random forest expects a single feature row".to_string());
            }
        };
        if row.len() != self.spec.inputs.len() {
            return Err(format!(
                "Expected {} features, got {}",
                self.spec.inputs.len(),
                row.len()
            ));
        }

        let input_matrix = match DenseMatrix::from_2d_vec(&vec![row]) {
            Ok(m) => m,
            Err(e) => return Err(format!("Matrix creation failed: {}", e)),
        };

        let mut step = Vec::with_capacity(self.forests.len());
        for forest in &self.forests {
            match forest.predict(&input_matrix) {
                Ok(predictions) => match predictions.first() {
                    Some(pred) => step.push(*pred),
                    None => return Err("No prediction returned".to_string()),
                },
                Err(e) => return Err(format!("Prediction failed: {}", e)),
            }
        }
        Ok(vec![step])
    }

    fn name(&self) -> &str {
        match self.spec.kind {
            PredictorKind::TabularSingle => "SmartCore Random Forest",
            _ => "SmartCore Random Forest (multi-target)",
        }
    }

    fn version(&self) -> &str {
        "v2.0"
    }
}

/// Every training row must carry exactly one value per named column.
fn ensure_widths(rows: &[Vec<f64>], columns: &[String]) -> Result<(), ForecastError> {
    match rows.iter().find(|row| row.len() != columns.len()) {
        Some(row) => Err(ForecastError::schema_mismatch(
            columns,
            &(0..row.len()).map(|i| format!("#{}", i)).collect::<Vec<_>>(),
        )),
        None => Ok(()),
    }
}
