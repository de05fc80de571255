use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Neutral score used for dates without any sentiment observation.
pub const NEUTRAL_SENTIMENT: f64 = 0.0;

/// Daily mean sentiment for one calendar date.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SentimentPoint {
    pub date: NaiveDate,
    pub mean_sentiment: f64,
}

/// Sentiment scores keyed by calendar date, one value per date.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SentimentSeries {
    daily: BTreeMap<NaiveDate, f64>,
}

impl SentimentSeries {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a series from daily points; a later point for the same date replaces the earlier one.
    pub fn from_points(points: impl IntoIterator<Item = SentimentPoint>) -> Self {
        let daily = points
            .into_iter()
            .filter(|p| p.mean_sentiment.is_finite())
            .map(|p| (p.date, p.mean_sentiment))
            .collect();
        Self { daily }
    }

    /// Averages individually scored items (e.g. headlines) into one mean per date.
    pub fn from_scored_items(items: impl IntoIterator<Item = (NaiveDate, f64)>) -> Self {
        let mut sums: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (date, score) in items {
            if !score.is_finite() {
                continue;
            }
            let entry = sums.entry(date).or_insert((0.0, 0));
            entry.0 += score;
            entry.1 += 1;
        }

        let daily = sums
            .into_iter()
            .map(|(date, (sum, count))| (date, sum / count as f64))
            .collect();
        Self { daily }
    }

    /// Score for a date, or `None` when the source had nothing for it.
    pub fn get(&self, date: NaiveDate) -> Option<f64> {
        self.daily.get(&date).copied()
    }

    /// Score for a date; missing dates are neutral.
    pub fn score_for(&self, date: NaiveDate) -> f64 {
        self.get(date).unwrap_or(NEUTRAL_SENTIMENT)
    }

    pub fn len(&self) -> usize {
        self.daily.len()
    }

    pub fn is_empty(&self) -> bool {
        self.daily.is_empty()
    }

    pub fn points(&self) -> Vec<SentimentPoint> {
        self.daily
            .iter()
            .map(|(date, mean_sentiment)| SentimentPoint {
                date: *date,
                mean_sentiment: *mean_sentiment,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_scored_items_average_per_date() {
        let series = SentimentSeries::from_scored_items(vec![
            (date(1), 0.5),
            (date(1), -0.1),
            (date(2), 0.3),
        ]);

        assert_eq!(series.len(), 2);
        assert!((series.score_for(date(1)) - 0.2).abs() < 1e-12);
        assert_eq!(series.score_for(date(2)), 0.3);
    }

    #[test]
    fn test_missing_date_is_neutral() {
        let series = SentimentSeries::from_points(vec![SentimentPoint {
            date: date(1),
            mean_sentiment: 0.8,
        }]);

        assert_eq!(series.get(date(5)), None);
        assert_eq!(series.score_for(date(5)), NEUTRAL_SENTIMENT);
    }

    #[test]
    fn test_non_finite_scores_are_ignored() {
        let series = SentimentSeries::from_scored_items(vec![(date(1), f64::NAN), (date(1), 0.4)]);
        assert_eq!(series.score_for(date(1)), 0.4);
    }
}
