use candlecast::application::forecast_pipeline::ForecastPipeline;
use candlecast::application::ml::predictor::{LastValuePredictor, Predictor, PredictorInput};
use candlecast::application::ml::smartcore_predictor::SmartCorePredictor;
use candlecast::config::{EngineConfig, FeatureConfig, IndicatorConfig, RollingSpec, RollingStat};
use candlecast::domain::errors::ForecastError;
use candlecast::domain::market::candle::Candle;
use candlecast::domain::ml::predictor_spec::{PredictorKind, PredictorSpec};
use candlecast::infrastructure::persistence::artifact_store::{ArtifactStore, ModelArtifacts};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal_macros::dec;
use smartcore::ensemble::random_forest_regressor::RandomForestRegressorParameters;
use std::sync::Mutex;

const MINUTE: i64 = 60_000;
// 2024-03-15 09:15 IST
const START: i64 = 1_710_474_300_000;

fn constant_candles(n: usize) -> Vec<Candle> {
    (0..n)
        .map(|i| Candle {
            symbol: "SBIN".to_string(),
            open: dec!(100),
            high: dec!(100),
            low: dec!(100),
            close: dec!(100),
            volume: dec!(1000),
            timestamp: START + i as i64 * MINUTE,
        })
        .collect()
}

fn random_walk(n: usize, seed: u64) -> Vec<Candle> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut close = 500.0_f64;
    (0..n)
        .map(|i| {
            let open = close;
            close = (close + rng.random_range(-2.0..2.0)).max(1.0);
            let high = open.max(close) + rng.random_range(0.0..1.0);
            let low = (open.min(close) - rng.random_range(0.0..1.0)).max(0.5);
            let volume = rng.random_range(1_000.0..5_000.0_f64).round();
            let d = |v: f64| Decimal::from_f64(v).unwrap().round_dp(4);
            Candle {
                symbol: "SBIN".to_string(),
                open: d(open),
                high: d(high),
                low: d(low),
                close: d(close),
                volume: d(volume),
                timestamp: START + i as i64 * MINUTE,
            }
        })
        .collect()
}

/// Price-only features so a flat series stays fully defined.
fn price_only_config() -> EngineConfig {
    EngineConfig {
        indicators: IndicatorConfig::none(),
        features: FeatureConfig {
            lag_columns: vec!["close".into(), "volume".into()],
            lags: vec![1, 2],
            rolling: vec![
                RollingSpec::new("close", 3, RollingStat::Mean),
                RollingSpec::new("close", 3, RollingStat::Std),
            ],
            include_close_change_pct: true,
            include_calendar: true,
            utc_offset_minutes: 330,
            ..FeatureConfig::minimal()
        },
        ..EngineConfig::default()
    }
}

#[test]
fn test_constant_series_forecasts_constant_close() {
    let pipeline = ForecastPipeline::new(price_only_config()).unwrap();
    let candles = constant_candles(400);
    let prepared = pipeline.prepare(&candles, None).unwrap();

    let predictor =
        LastValuePredictor::new(pipeline.predictor_spec(PredictorKind::TabularMulti)).unwrap();
    let forecast = pipeline.forecast("SBIN", &prepared, &predictor, 10).unwrap();

    assert_eq!(forecast.len(), 10);
    let last_known = candles.last().unwrap().timestamp;
    for (k, point) in forecast.points.iter().enumerate() {
        assert_eq!(point.timestamp, last_known + (k as i64 + 1) * MINUTE);
    }
    for close in forecast.series("close").unwrap() {
        assert!((close - 100.0).abs() < 1e-9, "close drifted to {}", close);
    }
}

#[test]
fn test_sequence_rollout_length_and_determinism() {
    let config = EngineConfig::default();
    let pipeline = ForecastPipeline::new(config).unwrap();
    let prepared = pipeline.prepare(&random_walk(400, 7), None).unwrap();

    // 1. Seq2seq model producing 3 steps per call
    let kind = PredictorKind::SequenceToSequence {
        lookback: 10,
        horizon: 3,
    };
    let predictor = LastValuePredictor::new(pipeline.predictor_spec(kind)).unwrap();

    // 2. 10 steps needs 4 calls; output is trimmed to exactly 10
    let forecaster = pipeline.forecaster(&prepared, predictor.spec().clone()).unwrap();
    let rollout = forecaster.advance(&predictor, 10).unwrap();
    assert_eq!(rollout.values.len(), 10);
    assert_eq!(rollout.predictor_calls, 4);

    // 3. Same inputs, same forecast
    let first = pipeline.forecast("SBIN", &prepared, &predictor, 10).unwrap();
    let second = pipeline.forecast("SBIN", &prepared, &predictor, 10).unwrap();
    assert_eq!(first, second);
    assert!(first.timestamps().windows(2).all(|w| w[1] - w[0] == MINUTE));
    assert!(first.points[0].timestamp > prepared.base.last_timestamp().unwrap());
}

#[test]
fn test_random_forest_end_to_end() {
    let pipeline = ForecastPipeline::new(EngineConfig::default()).unwrap();
    let prepared = pipeline.prepare(&random_walk(420, 11), None).unwrap();
    let spec = pipeline.predictor_spec(PredictorKind::TabularMulti);

    let windows = pipeline.training_windows(&prepared, &spec).unwrap();
    let x: Vec<Vec<f64>> = windows.train.iter().map(|w| w.inputs[0].clone()).collect();
    let y: Vec<Vec<f64>> = windows.train.iter().map(|w| w.targets[0].clone()).collect();

    let params = RandomForestRegressorParameters::default()
        .with_n_trees(10)
        .with_max_depth(6)
        .with_min_samples_split(2);
    let model = SmartCorePredictor::fit(spec, &x, &y, params).unwrap();

    let holdout = pipeline.evaluate(&prepared, &model).unwrap();
    assert_eq!(holdout.len(), 4);
    assert!(holdout.iter().all(|t| t.metrics.rmse.is_finite()));

    let forecast = pipeline.forecast("SBIN", &prepared, &model, 5).unwrap();
    assert_eq!(forecast.len(), 5);
    assert!(forecast.points.iter().all(|p| p.values.iter().all(|v| v.is_finite())));
}

#[test]
fn test_predictor_from_other_schema_is_rejected() {
    let pipeline = ForecastPipeline::new(EngineConfig::default()).unwrap();
    let prepared = pipeline.prepare(&random_walk(300, 3), None).unwrap();

    let other = ForecastPipeline::new(EngineConfig {
        features: FeatureConfig {
            excluded_inputs: vec!["hour".into()],
            ..FeatureConfig::default()
        },
        ..EngineConfig::default()
    })
    .unwrap();
    let predictor =
        LastValuePredictor::new(other.predictor_spec(PredictorKind::TabularMulti)).unwrap();

    let err = pipeline
        .forecast("SBIN", &prepared, &predictor, 3)
        .unwrap_err();
    assert!(matches!(err, ForecastError::SchemaMismatch { .. }));
}

#[test]
fn test_short_history_is_reported() {
    let pipeline = ForecastPipeline::new(EngineConfig::default()).unwrap();
    let err = pipeline.prepare(&random_walk(100, 5), None).unwrap_err();
    assert_eq!(
        err,
        ForecastError::InsufficientHistory {
            required: 252,
            available: 100
        }
    );
}

#[test]
fn test_artifacts_restore_the_same_forecast() {
    let pipeline = ForecastPipeline::new(price_only_config()).unwrap();
    let prepared = pipeline.prepare(&random_walk(200, 21), None).unwrap();
    let spec = pipeline.predictor_spec(PredictorKind::TabularMulti);

    let dir = std::env::temp_dir().join(format!(
        "candlecast_it_{}_{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0)
    ));
    let store = ArtifactStore::new(dir.join("model.json"));
    store
        .save(&ModelArtifacts::new(
            spec.clone(),
            &prepared.scaler,
            pipeline.config().timeframe,
        ))
        .unwrap();

    let restored = store.load().unwrap().unwrap();
    assert_eq!(restored.spec, spec);
    assert_eq!(restored.fitted_scaler().unwrap(), prepared.scaler);
    assert_eq!(
        restored.fitted_scaler().unwrap().transform(&prepared.features).unwrap(),
        prepared.scaled
    );

    std::fs::remove_dir_all(dir).ok();
}

/// Seq2seq stand-in that never sees OHLC: it climbs a little on every call
/// and keeps each input window it was given.
struct ClimbingPredictor {
    spec: PredictorSpec,
    seen: Mutex<Vec<Vec<Vec<f64>>>>,
}

impl Predictor for ClimbingPredictor {
    fn spec(&self) -> &PredictorSpec {
        &self.spec
    }

    fn predict(&self, input: &PredictorInput) -> Result<Vec<Vec<f64>>, String> {
        let window = match input {
            PredictorInput::Window(rows) => rows.to_vec(),
            PredictorInput::Row(row) => vec![row.to_vec()],
        };
        let mut seen = self.seen.lock().map_err(|e| e.to_string())?;
        let call = seen.len() as f64;
        seen.push(window);
        Ok((0..self.spec.kind.horizon())
            .map(|h| {
                let v = 0.4 + 0.05 * call + 0.01 * h as f64;
                vec![v, v + 0.01, v - 0.01, v]
            })
            .collect())
    }

    fn name(&self) -> &str {
        "climbing"
    }

    fn version(&self) -> &str {
        "test"
    }
}

#[test]
fn test_rollout_rebuilds_lags_of_excluded_targets() {
    let mut config = price_only_config();
    config.features.excluded_inputs = vec![
        "open".into(),
        "high".into(),
        "low".into(),
        "close".into(),
    ];
    let pipeline = ForecastPipeline::new(config).unwrap();
    let prepared = pipeline.prepare(&random_walk(200, 31), None).unwrap();
    let spec = pipeline.predictor_spec(PredictorKind::SequenceToSequence {
        lookback: 10,
        horizon: 3,
    });
    assert!(spec.inputs.index_of("close").is_none());

    // 1. Forecast length with the targets absent from the inputs
    let fresh = || ClimbingPredictor {
        spec: spec.clone(),
        seen: Mutex::new(Vec::new()),
    };
    let forecast = pipeline.forecast("SBIN", &prepared, &fresh(), 7).unwrap();
    assert_eq!(forecast.len(), 7);

    // 2. Lags and rolling means in later windows follow the predicted closes
    let predictor = fresh();
    let rollout = pipeline
        .forecaster(&prepared, spec.clone())
        .unwrap()
        .advance(&predictor, 7)
        .unwrap();
    assert_eq!(rollout.predictor_calls, 3);
    let close_t = rollout.fields.iter().position(|f| f == "close").unwrap();
    let predicted: Vec<f64> = rollout.values.iter().map(|row| row[close_t]).collect();

    let unscaled = |name: &str, window: &[Vec<f64>]| {
        let input = spec.inputs.index_of(name).unwrap();
        let column = prepared.scaler.column_index(name).unwrap();
        let last = window.last().unwrap();
        prepared.scaler.unscale_value(column, last[input])
    };
    let mean_name = RollingSpec::new("close", 3, RollingStat::Mean).output_name();
    let close_near = |a: f64, b: f64| (a - b).abs() <= 1e-9 * b.abs().max(1.0);

    let seen = predictor.seen.lock().unwrap();
    assert_eq!(seen.len(), 3);
    for call in 1..3 {
        // the window's last row is synthetic step 3 * call
        let step = 3 * call;
        let window = &seen[call];
        assert_eq!(window.len(), 10);
        assert!(close_near(unscaled("close_lag1", window), predicted[step - 2]));
        assert!(close_near(unscaled("close_lag2", window), predicted[step - 3]));
        let mean = predicted[step - 3..step].iter().sum::<f64>() / 3.0;
        assert!(close_near(unscaled(&mean_name, window), mean));
    }
}
