use crate::application::features::derivation::FeatureDeriver;
use crate::application::ml::predictor::{InputShape, Predictor, validate_output};
use crate::application::ml::scaler::{FittedScaler, ScaledMatrix};
use crate::domain::errors::ForecastError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::feature_frame::FeatureFrame;
use crate::domain::ml::feature_schema::FeatureSchema;
use crate::domain::ml::predictor_spec::PredictorSpec;
use tracing::{debug, info};

/// Raw output of one `advance` call, in original units and without timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct Rollout {
    /// Target column names, in the order of every `values` row.
    pub fields: Vec<String>,
    /// One row per future step.
    pub values: Vec<Vec<f64>>,
    /// Timestamp of the last known row the rollout started from.
    pub last_known_timestamp: i64,
    pub predictor_calls: usize,
}

/// Everything that changes while rolling forward.
#[derive(Debug, Clone)]
struct RolloutState {
    /// Unscaled base rows (OHLCV, indicators, sentiment), newest last.
    base_rows: Vec<Vec<f64>>,
    /// Full-width scaled feature rows, newest last.
    scaled_rows: Vec<Vec<f64>>,
    last_timestamp: i64,
}

/// Drives a predictor past the end of known data.
///
/// Each predicted step becomes a synthetic base row: target fields take the
/// prediction, every other base field repeats the previous row, and the
/// timestamp advances by one interval. Derived columns for that row come from
/// the same [`FeatureDeriver`] that built the training table, and the row is
/// scaled with the scaler fitted at training time.
pub struct RecursiveForecaster {
    spec: PredictorSpec,
    deriver: FeatureDeriver,
    scaler: FittedScaler,
    timeframe: Timeframe,
    shape: InputShape,
    input_indices: Vec<usize>,
    target_base: Vec<usize>,
    target_features: Vec<usize>,
    state: RolloutState,
}

impl RecursiveForecaster {
    /// Seeds the buffers from the tail of known data.
    ///
    /// `engine_inputs` is the input schema the feature builder presents;
    /// `base` and `scaled` must end on the same row.
    pub fn new(
        spec: PredictorSpec,
        engine_inputs: &FeatureSchema,
        deriver: FeatureDeriver,
        scaler: FittedScaler,
        timeframe: Timeframe,
        base: &FeatureFrame,
        scaled: &ScaledMatrix,
    ) -> Result<Self, ForecastError> {
        spec.validate()?;
        spec.inputs.ensure_matches(engine_inputs)?;

        if scaler.columns() != deriver.columns() {
            return Err(ForecastError::schema_mismatch(
                deriver.columns(),
                scaler.columns(),
            ));
        }
        if scaled.columns() != deriver.columns() {
            return Err(ForecastError::schema_mismatch(
                deriver.columns(),
                scaled.columns(),
            ));
        }
        if base.columns() != deriver.base_columns() {
            return Err(ForecastError::schema_mismatch(
                deriver.base_columns(),
                base.columns(),
            ));
        }

        let input_indices = spec.inputs.indices_in(deriver.columns())?;
        let targets = FeatureSchema::new(spec.targets.clone());
        let target_base = targets.indices_in(deriver.base_columns())?;
        let target_features = targets.indices_in(deriver.columns())?;

        let shape = InputShape::for_kind(spec.kind);
        let lookback = shape.rows_needed();
        if scaled.len() < lookback {
            return Err(ForecastError::InsufficientHistory {
                required: lookback,
                available: scaled.len(),
            });
        }
        let history = deriver.history_len();
        if base.len() < history {
            return Err(ForecastError::InsufficientHistory {
                required: history,
                available: base.len(),
            });
        }
        if base.last_timestamp() != scaled.frame().last_timestamp() {
            return Err(ForecastError::InvalidConfig(format!(
                "base rows end at {:?} but feature rows end at {:?}",
                base.last_timestamp(),
                scaled.frame().last_timestamp()
            )));
        }

        let seed = scaled.slice(scaled.len() - lookback..scaled.len());
        seed.frame().ensure_defined()?;
        let last_timestamp = base.last_timestamp().ok_or(ForecastError::InsufficientHistory {
            required: history,
            available: 0,
        })?;

        let state = RolloutState {
            base_rows: base.rows()[base.len() - history..].to_vec(),
            scaled_rows: seed.rows().to_vec(),
            last_timestamp,
        };

        Ok(Self {
            spec,
            deriver,
            scaler,
            timeframe,
            shape,
            input_indices,
            target_base,
            target_features,
            state,
        })
    }

    pub fn spec(&self) -> &PredictorSpec {
        &self.spec
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn last_known_timestamp(&self) -> i64 {
        self.state.last_timestamp
    }

    /// Generates exactly `n_future_steps` steps.
    ///
    /// Makes `ceil(n / H)` predictor calls and works on a copy of the seeded
    /// state, so calling it twice with a deterministic predictor yields the
    /// same rollout. Any failure discards every step produced so far.
    pub fn advance(
        &self,
        predictor: &dyn Predictor,
        n_future_steps: usize,
    ) -> Result<Rollout, ForecastError> {
        if predictor.spec() != &self.spec {
            let actual = predictor.spec();
            if actual.inputs != self.spec.inputs {
                return Err(ForecastError::schema_mismatch(
                    self.spec.inputs.columns(),
                    actual.inputs.columns(),
                ));
            }
            return Err(ForecastError::InvalidConfig(format!(
                "predictor '{}' declares {:?} -> [{}], forecaster was built for {:?} -> [{}]",
                predictor.name(),
                actual.kind,
                actual.targets.join(", "),
                self.spec.kind,
                self.spec.targets.join(", ")
            )));
        }

        info!(
            "RecursiveForecaster: rolling '{}' forward {} step(s) from {}",
            predictor.name(),
            n_future_steps,
            self.state.last_timestamp
        );

        let failure = |reason: String| ForecastError::PredictorFailure {
            predictor: predictor.name().to_string(),
            reason,
        };

        let mut state = self.state.clone();
        let mut values = Vec::with_capacity(n_future_steps);
        let mut calls = 0;

        while values.len() < n_future_steps {
            let buffer: Vec<Vec<f64>> = state
                .scaled_rows
                .iter()
                .map(|row| self.input_indices.iter().map(|&i| row[i]).collect())
                .collect();
            let input = self.shape.shape(&buffer)?;

            let output = predictor.predict(&input).map_err(failure)?;
            calls += 1;
            validate_output(&self.spec, &output).map_err(failure)?;

            for step in &output {
                if values.len() == n_future_steps {
                    break;
                }
                values.push(self.push_step(&mut state, step, values.len())?);
            }
        }

        debug!(
            "RecursiveForecaster: {} step(s) from {} predictor call(s)",
            values.len(),
            calls
        );

        Ok(Rollout {
            fields: self.spec.targets.clone(),
            values,
            last_known_timestamp: self.state.last_timestamp,
            predictor_calls: calls,
        })
    }

    /// Appends one synthetic row built from a scaled prediction; returns the
    /// prediction in original units.
    fn push_step(
        &self,
        state: &mut RolloutState,
        scaled_prediction: &[f64],
        step: usize,
    ) -> Result<Vec<f64>, ForecastError> {
        let unscaled: Vec<f64> = scaled_prediction
            .iter()
            .zip(&self.target_features)
            .map(|(&v, &col)| self.scaler.unscale_value(col, v))
            .collect();

        let mut base_row = state
            .base_rows
            .last()
            .cloned()
            .ok_or(ForecastError::InsufficientHistory {
                required: 1,
                available: 0,
            })?;
        for (&col, &v) in self.target_base.iter().zip(&unscaled) {
            base_row[col] = v;
        }

        let timestamp = self.timeframe.advance(state.last_timestamp, 1);
        state.base_rows.push(base_row);
        if state.base_rows.len() > self.deriver.history_len() {
            state.base_rows.remove(0);
        }

        let derived = self.deriver.derive(&state.base_rows, timestamp)?;
        let mut scaled = self.scaler.transform_row(&derived)?;
        for (&col, &v) in self.target_features.iter().zip(scaled_prediction) {
            scaled[col] = v;
        }
        if let Some(col) = scaled.iter().position(|v| !v.is_finite()) {
            return Err(ForecastError::UndefinedValue {
                column: self.deriver.columns()[col].clone(),
                row: step,
            });
        }

        state.scaled_rows.push(scaled);
        if state.scaled_rows.len() > self.shape.rows_needed() {
            state.scaled_rows.remove(0);
        }
        state.last_timestamp = timestamp;

        Ok(unscaled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::ml::predictor::{LastValuePredictor, PredictorInput};
    use crate::application::ml::scaler::TrainingPartition;
    use crate::config::FeatureConfig;
    use crate::domain::ml::predictor_spec::PredictorKind;
    use crate::domain::ml::scaling::ScalerKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const MINUTE: i64 = 60_000;

    fn base_columns() -> Vec<String> {
        ["open", "high", "low", "close", "volume"]
            .iter()
            .map(|s| s.to_string())
            .collect()
    }

    fn deriver() -> FeatureDeriver {
        let config = FeatureConfig {
            lag_columns: vec!["close".into()],
            lags: vec![1, 2],
            include_close_change_pct: true,
            ..FeatureConfig::minimal()
        };
        FeatureDeriver::new(base_columns(), &config).unwrap()
    }

    /// Base frame of `n` rows with a gentle trend, plus its complete scaled feature rows.
    fn history(n: usize) -> (FeatureFrame, ScaledMatrix, FittedScaler) {
        let deriver = deriver();
        let mut base = FeatureFrame::new(base_columns());
        for i in 0..n {
            let c = 100.0 + i as f64 * 0.5;
            base.push_row(i as i64 * MINUTE, vec![c - 0.1, c + 0.3, c - 0.3, c, 1_000.0])
                .unwrap();
        }
        let mut features = FeatureFrame::new(deriver.columns().to_vec());
        for i in 2..n {
            let values = deriver.derive(&base.rows()[..=i], i as i64 * MINUTE).unwrap();
            features.push_row(i as i64 * MINUTE, values).unwrap();
        }
        let scaler =
            FittedScaler::fit(ScalerKind::MinMax, &TrainingPartition::new(features.clone()))
                .unwrap();
        let scaled = scaler.transform(&features).unwrap();
        (base, scaled, scaler)
    }

    fn spec(kind: PredictorKind) -> PredictorSpec {
        PredictorSpec::new(
            kind,
            FeatureSchema::new(deriver().columns().to_vec()),
            vec!["open".into(), "high".into(), "low".into(), "close".into()],
        )
    }

    fn forecaster(kind: PredictorKind) -> RecursiveForecaster {
        let (base, scaled, scaler) = history(30);
        let spec = spec(kind);
        let inputs = spec.inputs.clone();
        RecursiveForecaster::new(spec, &inputs, deriver(), scaler, Timeframe::OneMin, &base, &scaled)
            .unwrap()
    }

    /// Counts calls and adds a fixed scaled increment to the last close.
    struct DriftPredictor {
        spec: PredictorSpec,
        calls: AtomicUsize,
        close_idx: usize,
    }

    impl Predictor for DriftPredictor {
        fn spec(&self) -> &PredictorSpec {
            &self.spec
        }

        fn predict(&self, input: &PredictorInput) -> Result<Vec<Vec<f64>>, String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let close = input.last_row().ok_or("empty")?[self.close_idx];
            let step = vec![close, close + 0.01, close - 0.01, close + 0.005];
            Ok(vec![step; self.spec.kind.horizon()])
        }

        fn name(&self) -> &str {
            "drift"
        }

        fn version(&self) -> &str {
            "test"
        }
    }

    fn drift(kind: PredictorKind) -> DriftPredictor {
        let spec = spec(kind);
        let close_idx = spec.inputs.index_of("close").unwrap();
        DriftPredictor {
            spec,
            calls: AtomicUsize::new(0),
            close_idx,
        }
    }

    #[test]
    fn test_length_and_call_count() {
        let kind = PredictorKind::SequenceToSequence {
            lookback: 5,
            horizon: 3,
        };
        let forecaster = forecaster(kind);
        let predictor = drift(kind);

        let rollout = forecaster.advance(&predictor, 10).unwrap();
        assert_eq!(rollout.values.len(), 10);
        assert_eq!(rollout.predictor_calls, 4);
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 4);
        assert_eq!(rollout.last_known_timestamp, 29 * MINUTE);
    }

    #[test]
    fn test_tabular_feeds_predictions_back() {
        let forecaster = forecaster(PredictorKind::TabularMulti);
        let predictor = drift(PredictorKind::TabularMulti);

        let rollout = forecaster.advance(&predictor, 5).unwrap();
        let closes: Vec<f64> = rollout.values.iter().map(|v| v[3]).collect();
        // each step's close builds on the previous predicted close
        for pair in closes.windows(2) {
            assert!(pair[1] > pair[0]);
        }
        assert_eq!(rollout.predictor_calls, 5);
    }

    #[test]
    fn test_advance_is_deterministic() {
        let forecaster = forecaster(PredictorKind::TabularMulti);
        let predictor = drift(PredictorKind::TabularMulti);

        let first = forecaster.advance(&predictor, 7).unwrap();
        let second = forecaster.advance(&predictor, 7).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn test_last_value_predictor_holds_prices() {
        let forecaster = forecaster(PredictorKind::TabularMulti);
        let predictor = LastValuePredictor::new(spec(PredictorKind::TabularMulti)).unwrap();

        let rollout = forecaster.advance(&predictor, 4).unwrap();
        for step in &rollout.values {
            assert!((step[3] - 114.5).abs() < 1e-9);
        }
    }

    #[test]
    fn test_malformed_output_discards_everything() {
        struct Broken(PredictorSpec);
        impl Predictor for Broken {
            fn spec(&self) -> &PredictorSpec {
                &self.0
            }
            fn predict(&self, _: &PredictorInput) -> Result<Vec<Vec<f64>>, String> {
                Ok(vec![vec![1.0]])
            }
            fn name(&self) -> &str {
                "broken"
            }
            fn version(&self) -> &str {
                "0"
            }
        }

        let forecaster = forecaster(PredictorKind::TabularMulti);
        let err = forecaster
            .advance(&Broken(spec(PredictorKind::TabularMulti)), 3)
            .unwrap_err();
        assert!(matches!(err, ForecastError::PredictorFailure { predictor, .. } if predictor == "broken"));
    }

    #[test]
    fn test_predictor_with_other_schema_is_rejected() {
        let forecaster = forecaster(PredictorKind::TabularMulti);
        let mut other = spec(PredictorKind::TabularMulti);
        other.inputs = FeatureSchema::from_names(&["close", "open"]);
        let predictor = DriftPredictor {
            spec: other,
            calls: AtomicUsize::new(0),
            close_idx: 0,
        };

        assert!(matches!(
            forecaster.advance(&predictor, 1),
            Err(ForecastError::SchemaMismatch { .. })
        ));
        assert_eq!(predictor.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_underflow_reported_at_construction() {
        let (base, scaled, scaler) = history(30);
        let spec = spec(PredictorKind::SequenceToSequence {
            lookback: 60,
            horizon: 1,
        });
        let inputs = spec.inputs.clone();
        let result = RecursiveForecaster::new(
            spec,
            &inputs,
            deriver(),
            scaler,
            Timeframe::OneMin,
            &base,
            &scaled,
        );
        assert_eq!(
            result.err(),
            Some(ForecastError::InsufficientHistory {
                required: 60,
                available: 28
            })
        );
    }

    #[test]
    fn test_engine_schema_must_match_trained_schema() {
        let (base, scaled, scaler) = history(30);
        let spec = spec(PredictorKind::TabularMulti);
        let engine_inputs = FeatureSchema::from_names(&["close"]);
        let result = RecursiveForecaster::new(
            spec,
            &engine_inputs,
            deriver(),
            scaler,
            Timeframe::OneMin,
            &base,
            &scaled,
        );
        assert!(matches!(result, Err(ForecastError::SchemaMismatch { .. })));
    }
}
