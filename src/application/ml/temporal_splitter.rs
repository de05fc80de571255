use crate::application::ml::scaler::TrainingPartition;
use crate::config::SplitConfig;
use crate::domain::errors::{ForecastError, ensure_strictly_increasing};
use crate::domain::ml::feature_frame::FeatureFrame;
use std::ops::Range;
use tracing::debug;

/// Chronological hold-out split.
#[derive(Debug, Clone)]
pub struct TrainTestSplit {
    pub train: TrainingPartition,
    pub test: FeatureFrame,
}

/// One walk-forward fold: train on everything up to `train_range.end`,
/// validate on the block after the purge gap.
#[derive(Debug, Clone)]
pub struct Fold {
    pub index: usize,
    pub train_range: Range<usize>,
    pub validation_range: Range<usize>,
    pub train: TrainingPartition,
    pub validation: FeatureFrame,
}

/// Splits time-ordered rows without ever shuffling them.
///
/// Every split satisfies `max(train.timestamp) < min(test.timestamp)`.
#[derive(Debug, Clone)]
pub struct TemporalSplitter {
    config: SplitConfig,
}

impl TemporalSplitter {
    pub fn new(config: SplitConfig) -> Result<Self, ForecastError> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &SplitConfig {
        &self.config
    }

    /// Train = first `floor(n * train_fraction)` rows, test = the rest after the gap.
    pub fn split(&self, frame: &FeatureFrame) -> Result<TrainTestSplit, ForecastError> {
        ensure_strictly_increasing(frame.timestamps(), "temporal split")?;
        let (train_range, test_range) =
            holdout_ranges(frame.len(), self.config.train_fraction, self.config.gap)?;

        debug!(
            "TemporalSplitter: train {:?}, test {:?} of {} rows",
            train_range,
            test_range,
            frame.len()
        );

        Ok(TrainTestSplit {
            train: TrainingPartition::new(frame.slice(train_range)),
            test: frame.slice(test_range),
        })
    }

    /// Expanding-window folds in `TimeSeriesSplit` geometry.
    pub fn walk_forward(&self, frame: &FeatureFrame) -> Result<Vec<Fold>, ForecastError> {
        ensure_strictly_increasing(frame.timestamps(), "walk-forward split")?;
        let ranges = fold_ranges(frame.len(), self.config.n_folds, self.config.gap)?;

        Ok(ranges
            .into_iter()
            .enumerate()
            .map(|(index, (train_range, validation_range))| Fold {
                index,
                train: TrainingPartition::new(frame.slice(train_range.clone())),
                validation: frame.slice(validation_range.clone()),
                train_range,
                validation_range,
            })
            .collect())
    }
}

/// Index ranges of a fractional hold-out split with a purge gap.
pub fn holdout_ranges(
    n: usize,
    train_fraction: f64,
    gap: usize,
) -> Result<(Range<usize>, Range<usize>), ForecastError> {
    let split = (n as f64 * train_fraction).floor() as usize;
    let test_start = split + gap;
    if split == 0 || test_start >= n {
        return Err(ForecastError::InsufficientHistory {
            required: minimum_rows(train_fraction, gap),
            available: n,
        });
    }
    Ok((0..split, test_start..n))
}

fn minimum_rows(train_fraction: f64, gap: usize) -> usize {
    // smallest n with floor(n * f) >= 1 and n - floor(n * f) > gap; both
    // conditions are monotone in n, so bisect instead of scanning
    let fits = |n: usize| {
        let split = (n as f64 * train_fraction).floor() as usize;
        split >= 1 && n - split.min(n) > gap
    };
    let upper = (2.0 / train_fraction)
        .max((gap as f64 + 2.0) / (1.0 - train_fraction))
        .ceil();
    let mut hi = if upper.is_finite() && upper < usize::MAX as f64 {
        upper as usize
    } else {
        usize::MAX
    };
    if !fits(hi) {
        return usize::MAX;
    }
    let mut lo = 0;
    while hi - lo > 1 {
        let mid = lo + (hi - lo) / 2;
        if fits(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}

/// Index ranges of `n_folds` expanding-window folds over `n` rows.
///
/// Validation blocks have `n / (n_folds + 1)` rows and tile the tail of the
/// series; each training block ends `gap` rows before its validation block.
pub fn fold_ranges(
    n: usize,
    n_folds: usize,
    gap: usize,
) -> Result<Vec<(Range<usize>, Range<usize>)>, ForecastError> {
    if n_folds == 0 {
        return Err(ForecastError::InvalidConfig(
            "n_folds must be >= 1".to_string(),
        ));
    }
    let test_size = n / (n_folds + 1);
    let first_test = n.saturating_sub(n_folds * test_size);
    if test_size == 0 || first_test <= gap {
        return Err(ForecastError::InsufficientHistory {
            required: n_folds + 1 + gap,
            available: n,
        });
    }

    Ok((0..n_folds)
        .map(|i| {
            let test_start = first_test + i * test_size;
            (0..test_start - gap, test_start..test_start + test_size)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(n: usize) -> FeatureFrame {
        let mut frame = FeatureFrame::new(vec!["close".into()]);
        for i in 0..n {
            frame.push_row(i as i64 * 60_000, vec![i as f64]).unwrap();
        }
        frame
    }

    #[test]
    fn test_fraction_split() {
        let splitter = TemporalSplitter::new(SplitConfig::default()).unwrap();
        let split = splitter.split(&frame(100)).unwrap();

        assert_eq!(split.train.len(), 90);
        assert_eq!(split.test.len(), 10);
        assert!(
            split.train.frame().last_timestamp().unwrap() < split.test.first_timestamp().unwrap()
        );
    }

    #[test]
    fn test_gap_purges_rows() {
        assert_eq!(holdout_ranges(100, 0.8, 5).unwrap(), (0..80, 85..100));
    }

    #[test]
    fn test_split_needs_rows_on_both_sides() {
        assert!(matches!(
            holdout_ranges(1, 0.9, 0),
            Err(ForecastError::InsufficientHistory { .. })
        ));
        assert!(holdout_ranges(10, 0.9, 0).is_ok());
        assert_eq!(minimum_rows(0.9, 0), 2);
        assert_eq!(minimum_rows(0.5, 3), 7);
        assert_eq!(minimum_rows(0.8, 5), 26);
    }

    #[test]
    fn test_tiny_train_fraction_fails_fast() {
        let err = holdout_ranges(100, 1e-12, 0).unwrap_err();
        match err {
            ForecastError::InsufficientHistory {
                required,
                available,
            } => {
                assert_eq!(available, 100);
                assert!(required >= 999_999_999_999, "required {}", required);
            }
            other => panic!("unexpected error: {:?}", other),
        }

        let splitter = TemporalSplitter::new(SplitConfig {
            train_fraction: 1e-12,
            ..SplitConfig::default()
        })
        .unwrap();
        assert!(splitter.split(&frame(50)).is_err());
    }

    #[test]
    fn test_time_series_split_geometry() {
        // matches sklearn TimeSeriesSplit(n_splits=3) on 10 samples
        let folds = fold_ranges(10, 3, 0).unwrap();
        assert_eq!(
            folds,
            vec![(0..4, 4..6), (0..6, 6..8), (0..8, 8..10)]
        );
    }

    #[test]
    fn test_fold_gap() {
        let folds = fold_ranges(12, 2, 1).unwrap();
        assert_eq!(folds, vec![(0..3, 4..8), (0..7, 8..12)]);
    }

    #[test]
    fn test_walk_forward_never_overlaps() {
        let splitter = TemporalSplitter::new(SplitConfig {
            n_folds: 4,
            gap: 2,
            ..SplitConfig::default()
        })
        .unwrap();
        let folds = splitter.walk_forward(&frame(103)).unwrap();

        assert_eq!(folds.len(), 4);
        for fold in &folds {
            let train_end = fold.train.frame().last_timestamp().unwrap();
            let valid_start = fold.validation.first_timestamp().unwrap();
            assert!(train_end < valid_start);
            assert_eq!(fold.validation_range.start - fold.train_range.end, 2);
        }
        for pair in folds.windows(2) {
            assert!(pair[0].train.len() < pair[1].train.len());
            assert_eq!(pair[0].validation_range.end, pair[1].validation_range.start);
        }
    }

    #[test]
    fn test_too_few_rows_for_folds() {
        assert!(matches!(
            fold_ranges(3, 3, 0),
            Err(ForecastError::InsufficientHistory { .. })
        ));
    }

    #[test]
    fn test_misordered_frame_is_rejected() {
        let mut bad = FeatureFrame::new(vec!["close".into()]);
        bad.push_row(10, vec![1.0]).unwrap();
        bad.push_row(5, vec![2.0]).unwrap();
        let splitter = TemporalSplitter::new(SplitConfig::default()).unwrap();
        assert!(matches!(
            splitter.split(&bad),
            Err(ForecastError::LeakagePrecondition { .. })
        ));
    }
}
