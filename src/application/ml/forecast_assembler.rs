use crate::application::ml::recursive_forecaster::Rollout;
use crate::domain::errors::ForecastError;
use crate::domain::market::timeframe::Timeframe;
use crate::domain::ml::forecast::{Forecast, ForecastPoint};

/// Attaches future timestamps to a rollout.
///
/// Step `k` (1-based) lands at `last_known + k * interval`, so a forecast never
/// overlaps the known series.
#[derive(Debug, Clone, Copy)]
pub struct ForecastAssembler {
    timeframe: Timeframe,
}

impl ForecastAssembler {
    pub fn new(timeframe: Timeframe) -> Self {
        Self { timeframe }
    }

    pub fn future_timestamps(&self, last_known: i64, n: usize) -> Vec<i64> {
        (1..=n)
            .map(|k| self.timeframe.advance(last_known, k))
            .collect()
    }

    pub fn assemble(
        &self,
        symbol: &str,
        rollout: Rollout,
        requested: usize,
    ) -> Result<Forecast, ForecastError> {
        if rollout.values.len() != requested {
            return Err(ForecastError::InvalidConfig(format!(
                "rollout produced {} step(s) for a horizon of {}",
                rollout.values.len(),
                requested
            )));
        }
        if let Some(bad) = rollout.values.iter().find(|v| v.len() != rollout.fields.len()) {
            return Err(ForecastError::InvalidConfig(format!(
                "forecast step has {} value(s) for {} field(s)",
                bad.len(),
                rollout.fields.len()
            )));
        }

        let points = self
            .future_timestamps(rollout.last_known_timestamp, requested)
            .into_iter()
            .zip(rollout.values)
            .map(|(timestamp, values)| ForecastPoint { timestamp, values })
            .collect();

        Ok(Forecast {
            symbol: symbol.to_string(),
            fields: rollout.fields,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rollout(steps: usize) -> Rollout {
        Rollout {
            fields: vec!["close".into()],
            values: (0..steps).map(|i| vec![100.0 + i as f64]).collect(),
            last_known_timestamp: 1_700_000_000_000,
            predictor_calls: steps,
        }
    }

    #[test]
    fn test_timestamps_follow_last_known() {
        let assembler = ForecastAssembler::new(Timeframe::FiveMin);
        let forecast = assembler.assemble("NIFTY", rollout(3), 3).unwrap();

        assert_eq!(
            forecast.timestamps(),
            vec![
                1_700_000_300_000,
                1_700_000_600_000,
                1_700_000_900_000
            ]
        );
        assert_eq!(forecast.series("close"), Some(vec![100.0, 101.0, 102.0]));
        assert_eq!(forecast.symbol, "NIFTY");
    }

    #[test]
    fn test_length_must_match_request() {
        let assembler = ForecastAssembler::new(Timeframe::OneMin);
        assert!(assembler.assemble("X", rollout(2), 3).is_err());
    }

    #[test]
    fn test_empty_horizon() {
        let assembler = ForecastAssembler::new(Timeframe::OneDay);
        let forecast = assembler.assemble("X", rollout(0), 0).unwrap();
        assert!(forecast.is_empty());
    }
}
