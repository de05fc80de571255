use crate::application::features::feature_builder::FeatureBuilder;
use crate::application::ml::evaluation::{self, FoldReport, TargetMetrics};
use crate::application::ml::forecast_assembler::ForecastAssembler;
use crate::application::ml::predictor::Predictor;
use crate::application::ml::recursive_forecaster::RecursiveForecaster;
use crate::application::ml::scaler::{FittedScaler, ScaledMatrix};
use crate::application::ml::temporal_splitter::{TemporalSplitter, TrainTestSplit};
use crate::application::ml::window_sequencer::{Window, WindowSequencer};
use crate::config::EngineConfig;
use crate::domain::errors::ForecastError;
use crate::domain::market::benchmark::BenchmarkSeries;
use crate::domain::market::candle::Candle;
use crate::domain::ml::feature_frame::FeatureFrame;
use crate::domain::ml::forecast::Forecast;
use crate::domain::ml::predictor_spec::{PredictorKind, PredictorSpec};
use crate::domain::sentiment::SentimentSeries;
use tracing::info;

/// Everything derived from one candle series, ready for training or rollout.
#[derive(Debug, Clone)]
pub struct PreparedData {
    /// Unscaled base rows for every candle.
    pub base: FeatureFrame,
    /// Complete feature rows, unscaled.
    pub features: FeatureFrame,
    pub split: TrainTestSplit,
    /// Fitted on `split.train` only.
    pub scaler: FittedScaler,
    /// All of `features`, scaled.
    pub scaled: ScaledMatrix,
}

impl PreparedData {
    pub fn train_len(&self) -> usize {
        self.split.train.len()
    }

    /// Index of the first test row in `features`.
    pub fn test_start(&self) -> usize {
        self.features.len() - self.split.test.len()
    }
}

#[derive(Debug, Clone)]
pub struct TrainingWindows {
    pub train: Vec<Window>,
    pub test: Vec<Window>,
}

/// Candles in, forecast out.
pub struct ForecastPipeline {
    config: EngineConfig,
    builder: FeatureBuilder,
    splitter: TemporalSplitter,
    assembler: ForecastAssembler,
}

impl ForecastPipeline {
    pub fn new(config: EngineConfig) -> Result<Self, ForecastError> {
        config.validate()?;
        let builder = FeatureBuilder::new(config.indicators.clone(), config.features.clone())?;
        let splitter = TemporalSplitter::new(config.split.clone())?;
        let assembler = ForecastAssembler::new(config.timeframe);
        Ok(Self {
            config,
            builder,
            splitter,
            assembler,
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn builder(&self) -> &FeatureBuilder {
        &self.builder
    }

    /// Spec for a predictor trained on this pipeline's inputs and targets.
    pub fn predictor_spec(&self, kind: PredictorKind) -> PredictorSpec {
        PredictorSpec::new(
            kind,
            self.builder.input_schema().clone(),
            self.config.forecast.targets.clone(),
        )
    }

    /// `SequenceToSequence` with the configured lookback and horizon.
    pub fn sequence_kind(&self) -> PredictorKind {
        PredictorKind::SequenceToSequence {
            lookback: self.config.forecast.lookback,
            horizon: self.config.forecast.horizon,
        }
    }

    /// Indicators, features, chronological split, scaler fit on the training
    /// block, then the whole feature table scaled.
    pub fn prepare(
        &self,
        candles: &[Candle],
        sentiment: Option<&SentimentSeries>,
    ) -> Result<PreparedData, ForecastError> {
        self.prepare_with_benchmark(candles, sentiment, None)
    }

    /// Like [`prepare`](Self::prepare), with a benchmark index for the
    /// relative-strength columns.
    pub fn prepare_with_benchmark(
        &self,
        candles: &[Candle],
        sentiment: Option<&SentimentSeries>,
        benchmark: Option<&BenchmarkSeries>,
    ) -> Result<PreparedData, ForecastError> {
        let (base, features) = self.builder.build_frames(candles, sentiment, benchmark)?;
        let split = self.splitter.split(&features)?;
        let scaler = FittedScaler::fit(self.config.scaler, &split.train)?;
        let scaled = scaler.transform(&features)?;

        info!(
            "ForecastPipeline: prepared {} rows ({} train / {} test), scaler {}",
            features.len(),
            split.train.len(),
            split.test.len(),
            scaler.kind()
        );

        Ok(PreparedData {
            base,
            features,
            split,
            scaler,
            scaled,
        })
    }

    fn sequencer(&self, spec: &PredictorSpec) -> Result<WindowSequencer, ForecastError> {
        WindowSequencer::new(
            spec.kind.lookback(),
            spec.kind.horizon(),
            &spec.inputs,
            &spec.targets,
            self.builder.columns(),
        )
    }

    /// Windows over the training block and over the test block; no window
    /// crosses the split point.
    pub fn training_windows(
        &self,
        prepared: &PreparedData,
        spec: &PredictorSpec,
    ) -> Result<TrainingWindows, ForecastError> {
        spec.validate()?;
        let sequencer = self.sequencer(spec)?;
        let n = prepared.scaled.len();
        let train = sequencer.windows(&prepared.scaled.slice(0..prepared.train_len()))?;
        let test_block = prepared.scaled.slice(prepared.test_start()..n);
        // a short test block only means nothing to score
        let test = if test_block.len() >= sequencer.lookback() + sequencer.horizon() {
            sequencer.windows(&test_block)?
        } else {
            Vec::new()
        };
        Ok(TrainingWindows { train, test })
    }

    /// Forecaster seeded from the end of `prepared`.
    pub fn forecaster(
        &self,
        prepared: &PreparedData,
        spec: PredictorSpec,
    ) -> Result<RecursiveForecaster, ForecastError> {
        RecursiveForecaster::new(
            spec,
            self.builder.input_schema(),
            self.builder.deriver().clone(),
            prepared.scaler.clone(),
            self.config.timeframe,
            &prepared.base,
            &prepared.scaled,
        )
    }

    /// `n_future_steps` future points after the last known candle.
    pub fn forecast(
        &self,
        symbol: &str,
        prepared: &PreparedData,
        predictor: &dyn Predictor,
        n_future_steps: usize,
    ) -> Result<Forecast, ForecastError> {
        let forecaster = self.forecaster(prepared, predictor.spec().clone())?;
        let rollout = forecaster.advance(predictor, n_future_steps)?;
        self.assembler.assemble(symbol, rollout, n_future_steps)
    }

    /// Hold-out scores on the test block.
    pub fn evaluate(
        &self,
        prepared: &PreparedData,
        predictor: &dyn Predictor,
    ) -> Result<Vec<TargetMetrics>, ForecastError> {
        let sequencer = self.sequencer(predictor.spec())?;
        let required = sequencer.lookback() + sequencer.horizon();
        let available = prepared.split.test.len();
        if available < required {
            return Err(ForecastError::InsufficientHistory {
                required,
                available,
            });
        }
        let windows = self.training_windows(prepared, predictor.spec())?;
        evaluation::evaluate_windows(predictor, &windows.test, &prepared.scaler)
    }

    /// Walk-forward scores, one scaler per fold.
    pub fn cross_validate(
        &self,
        prepared: &PreparedData,
        predictor: &dyn Predictor,
    ) -> Result<Vec<FoldReport>, ForecastError> {
        let folds = self.splitter.walk_forward(&prepared.features)?;
        let sequencer = self.sequencer(predictor.spec())?;
        evaluation::evaluate_folds(predictor, &folds, self.config.scaler, &sequencer)
    }
}
