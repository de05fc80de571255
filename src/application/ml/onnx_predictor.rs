use super::predictor::{Predictor, PredictorInput};
use crate::domain::ml::predictor_spec::PredictorSpec;
use anyhow::{Context, Result};
use ort::session::Session;
use std::path::Path;
use std::sync::Mutex;
use tracing::info;

/// ONNX Runtime model (LSTM / seq2seq exports).
///
/// Windows are fed as a `[1, L, F]` float tensor, single rows as `[1, F]`.
/// The first output must flatten to `horizon x targets` values, step-major.
pub struct OnnxSequencePredictor {
    session: Mutex<Session>,
    spec: PredictorSpec,
}

impl OnnxSequencePredictor {
    pub fn load(model_path: impl AsRef<Path>, spec: PredictorSpec) -> Result<Self> {
        let model_path = model_path.as_ref();
        spec.validate()?;
        if !model_path.exists() {
            anyhow::bail!("ONNX model file not found at {:?}", model_path);
        }

        let session = Session::builder()
            .context("Failed to create ONNX session builder")?
            .commit_from_file(model_path)
            .with_context(|| format!("Failed to load ONNX model from {:?}", model_path))?;

        info!("Successfully loaded ONNX model from {:?}", model_path);
        Ok(Self {
            session: Mutex::new(session),
            spec,
        })
    }

    fn to_tensor(&self, input: &PredictorInput) -> Result<(Vec<usize>, Vec<f32>), String> {
        let width = self.spec.inputs.len();
        let (shape, rows): (Vec<usize>, Vec<&[f64]>) = match input {
            PredictorInput::Row(row) => (vec![1, width], vec![*row]),
            PredictorInput::Window(rows) => (
                vec![1, rows.len(), width],
                rows.iter().map(|r| r.as_slice()).collect(),
            ),
        };
        if let Some(bad) = rows.iter().find(|r| r.len() != width) {
            return Err(format!("Expected {} features, got {}", width, bad.len()));
        }
        // Flatten into a single vector [batch, seq_len, features]
        let flat_data: Vec<f32> = rows.iter().flat_map(|r| r.iter().map(|&v| v as f32)).collect();
        Ok((shape, flat_data))
    }
}

impl Predictor for OnnxSequencePredictor {
    fn spec(&self) -> &PredictorSpec {
        &self.spec
    }

    fn predict(&self, input: &PredictorInput) -> Result<Vec<Vec<f64>>, String> {
        let (shape, flat_data) = self.to_tensor(input)?;

        let mut session = self
            .session
            .lock()
            .map_err(|e| format!("Mutex lock failed: {}", e))?;

        let input_value = ort::value::Value::from_array((shape.as_slice(), flat_data))
            .map_err(|e| format!("Input value creation failed: {}", e))?;

        let inputs = ort::inputs![input_value];

        let outputs = session.run(inputs).map_err(|e| e.to_string())?;
        let output_value = outputs
            .iter()
            .next()
            .map(|(_, v)| v)
            .ok_or("No output found")?;
        let data = output_value
            .try_extract_tensor::<f32>()
            .map_err(|e| e.to_string())?;
        let values: Vec<f64> = data.1.iter().map(|&v| v as f64).collect();

        let targets = self.spec.targets.len();
        let horizon = self.spec.kind.horizon();
        if values.len() != horizon * targets {
            return Err(format!(
                "Output holds {} values, expected {} x {}",
                values.len(),
                horizon,
                targets
            ));
        }
        Ok(values.chunks(targets).map(|c| c.to_vec()).collect())
    }

    fn name(&self) -> &str {
        "ONNX Runtime (sequence)"
    }

    fn version(&self) -> &str {
        "v3.0 (stateless)"
    }
}
