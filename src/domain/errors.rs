use thiserror::Error;

/// Errors raised by the feature and forecast engine.
///
/// Every variant is fatal for the operation that produced it: nothing in the
/// engine retries, truncates or coerces its way past one of these.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ForecastError {
    #[error("Insufficient history: need {required} rows, have {available}")]
    InsufficientHistory { required: usize, available: usize },

    #[error("Schema mismatch: expected [{}], got [{}]", expected.join(", "), actual.join(", "))]
    SchemaMismatch {
        expected: Vec<String>,
        actual: Vec<String>,
    },

    #[error("Undefined value in column '{column}' at row {row}")]
    UndefinedValue { column: String, row: usize },

    #[error("Predictor '{predictor}' failed: {reason}")]
    PredictorFailure { predictor: String, reason: String },

    #[error("Leakage precondition violated: {reason}")]
    LeakagePrecondition { reason: String },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),
}

impl ForecastError {
    pub fn schema_mismatch(expected: &[String], actual: &[String]) -> Self {
        ForecastError::SchemaMismatch {
            expected: expected.to_vec(),
            actual: actual.to_vec(),
        }
    }
}

/// Ensures timestamps are strictly increasing.
///
/// Misordered input is reported as a leakage precondition failure because any
/// later split or rolling computation over it would mix future rows into the past.
pub fn ensure_strictly_increasing(timestamps: &[i64], context: &str) -> Result<(), ForecastError> {
    if let Some(pos) = timestamps.windows(2).position(|w| w[1] <= w[0]) {
        return Err(ForecastError::LeakagePrecondition {
            reason: format!(
                "{}: timestamp {} at row {} does not follow {}",
                context,
                timestamps[pos + 1],
                pos + 1,
                timestamps[pos]
            ),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_history_formatting() {
        let error = ForecastError::InsufficientHistory {
            required: 252,
            available: 40,
        };

        let msg = error.to_string();
        assert!(msg.contains("252"));
        assert!(msg.contains("40"));
    }

    #[test]
    fn test_schema_mismatch_lists_columns() {
        let error = ForecastError::schema_mismatch(
            &["close".to_string(), "rsi".to_string()],
            &["rsi".to_string(), "close".to_string()],
        );

        let msg = error.to_string();
        assert!(msg.contains("expected [close, rsi]"));
        assert!(msg.contains("got [rsi, close]"));
    }

    #[test]
    fn test_strictly_increasing_accepts_ordered() {
        assert!(ensure_strictly_increasing(&[1, 2, 5, 9], "test").is_ok());
        assert!(ensure_strictly_increasing(&[], "test").is_ok());
    }

    #[test]
    fn test_strictly_increasing_rejects_duplicates_and_reversal() {
        let dup = ensure_strictly_increasing(&[1, 2, 2], "split");
        assert!(matches!(
            dup,
            Err(ForecastError::LeakagePrecondition { .. })
        ));

        let reversed = ensure_strictly_increasing(&[3, 1], "fit");
        match reversed {
            Err(ForecastError::LeakagePrecondition { reason }) => {
                assert!(reason.starts_with("fit"));
                assert!(reason.contains("row 1"));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }
}
