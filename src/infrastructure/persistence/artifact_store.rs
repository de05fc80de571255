//! Persistence for everything a trained predictor needs at inference time.
//!
//! The predictor spec (kind, ordered input schema, targets) and the fitted
//! scaler travel together, so a model is never fed columns in an order or
//! scale it was not trained on.

use crate::application::ml::scaler::FittedScaler;
use crate::domain::errors::ForecastError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::predictor_spec::PredictorSpec;
use crate::domain::ml::scaling::ScalerParams;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifacts {
    pub spec: PredictorSpec,
    pub scaler: ScalerParams,
    pub timeframe: Timeframe,
}

impl ModelArtifacts {
    pub fn new(spec: PredictorSpec, scaler: &FittedScaler, timeframe: Timeframe) -> Self {
        Self {
            spec,
            scaler: scaler.params().clone(),
            timeframe,
        }
    }

    /// Spec and scaler must agree: every input and target is a scaled column.
    pub fn validate(&self) -> Result<(), ForecastError> {
        self.spec.validate()?;
        self.scaler.validate()?;
        for column in self.spec.inputs.columns().iter().chain(&self.spec.targets) {
            if !self.scaler.columns.contains(column) {
                return Err(ForecastError::UnknownColumn(column.clone()));
            }
        }
        Ok(())
    }

    pub fn fitted_scaler(&self) -> Result<FittedScaler, ForecastError> {
        FittedScaler::from_params(self.scaler.clone())
    }
}

/// JSON file holding one [`ModelArtifacts`].
pub struct ArtifactStore {
    file_path: PathBuf,
}

impl ArtifactStore {
    pub fn new(file_path: impl Into<PathBuf>) -> Self {
        Self {
            file_path: file_path.into(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    /// `None` when nothing has been saved yet.
    pub fn load(&self) -> Result<Option<ModelArtifacts>> {
        if !self.file_path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(&self.file_path)
            .with_context(|| format!("Failed to read artifacts {}", self.file_path.display()))?;
        let artifacts: ModelArtifacts =
            serde_json::from_str(&content).context("Failed to parse model artifacts JSON")?;
        artifacts
            .validate()
            .context("Stored model artifacts are inconsistent")?;

        info!("Loaded model artifacts from {:?}", self.file_path);
        Ok(Some(artifacts))
    }

    pub fn save(&self, artifacts: &ModelArtifacts) -> Result<()> {
        artifacts
            .validate()
            .context("Refusing to save inconsistent model artifacts")?;
        let content = serde_json::to_string_pretty(artifacts)
            .context("Failed to serialize model artifacts")?;

        if let Some(dir) = self.file_path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).context("Failed to create artifact directory")?;
        }

        // Atomic write: write to temp file then rename
        let temp_path = self.file_path.with_extension("tmp");
        fs::write(&temp_path, content).context("Failed to write temp file")?;
        fs::rename(&temp_path, &self.file_path).context("Failed to rename temp file")?;

        info!("Saved model artifacts to {:?}", self.file_path);
        Ok(())
    }
}
