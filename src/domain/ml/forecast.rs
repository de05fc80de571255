use serde::{Deserialize, Serialize};

/// One future step in original (unscaled) units.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastPoint {
    pub timestamp: i64,
    pub values: Vec<f64>,
}

/// Forecast series: `fields` names the entries of every point's `values`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Forecast {
    pub symbol: String,
    pub fields: Vec<String>,
    pub points: Vec<ForecastPoint>,
}

impl Forecast {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn field_index(&self, field: &str) -> Option<usize> {
        self.fields.iter().position(|f| f == field)
    }

    /// All values of one field, in time order.
    pub fn series(&self, field: &str) -> Option<Vec<f64>> {
        let idx = self.field_index(field)?;
        Some(self.points.iter().map(|p| p.values[idx]).collect())
    }

    pub fn timestamps(&self) -> Vec<i64> {
        self.points.iter().map(|p| p.timestamp).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_series_lookup() {
        let forecast = Forecast {
            symbol: "SBIN".into(),
            fields: vec!["open".into(), "close".into()],
            points: vec![
                ForecastPoint {
                    timestamp: 60_000,
                    values: vec![1.0, 2.0],
                },
                ForecastPoint {
                    timestamp: 120_000,
                    values: vec![3.0, 4.0],
                },
            ],
        };

        assert_eq!(forecast.series("close"), Some(vec![2.0, 4.0]));
        assert_eq!(forecast.series("volume"), None);
        assert_eq!(forecast.timestamps(), vec![60_000, 120_000]);
    }
}
