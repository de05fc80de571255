use crate::domain::errors::ForecastError;
use crate::domain::ml::feature_schema::FeatureSchema;
use std::ops::Range;

/// Row-major numeric table with named columns and one timestamp per row.
///
/// Timestamps are not a column; they travel beside the values so they can never
/// end up in a predictor's input by accident.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FeatureFrame {
    columns: Vec<String>,
    timestamps: Vec<i64>,
    rows: Vec<Vec<f64>>,
}

impl FeatureFrame {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            timestamps: Vec::new(),
            rows: Vec::new(),
        }
    }

    pub fn with_capacity(columns: Vec<String>, capacity: usize) -> Self {
        Self {
            columns,
            timestamps: Vec::with_capacity(capacity),
            rows: Vec::with_capacity(capacity),
        }
    }

    pub fn push_row(&mut self, timestamp: i64, values: Vec<f64>) -> Result<(), ForecastError> {
        if values.len() != self.columns.len() {
            return Err(ForecastError::InvalidConfig(format!(
                "row has {} values, frame has {} columns",
                values.len(),
                self.columns.len()
            )));
        }
        self.timestamps.push(timestamp);
        self.rows.push(values);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn schema(&self) -> FeatureSchema {
        FeatureSchema::new(self.columns.clone())
    }

    pub fn timestamps(&self) -> &[i64] {
        &self.timestamps
    }

    pub fn rows(&self) -> &[Vec<f64>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[f64]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    pub fn first_timestamp(&self) -> Option<i64> {
        self.timestamps.first().copied()
    }

    pub fn last_timestamp(&self) -> Option<i64> {
        self.timestamps.last().copied()
    }

    pub fn column_index(&self, name: &str) -> Result<usize, ForecastError> {
        self.columns
            .iter()
            .position(|c| c == name)
            .ok_or_else(|| ForecastError::UnknownColumn(name.to_string()))
    }

    pub fn column(&self, name: &str) -> Result<Vec<f64>, ForecastError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.iter().map(|r| r[idx]).collect())
    }

    pub fn value(&self, row: usize, name: &str) -> Result<Option<f64>, ForecastError> {
        let idx = self.column_index(name)?;
        Ok(self.rows.get(row).map(|r| r[idx]))
    }

    /// Copy of rows in `range` (clamped to the frame length).
    pub fn slice(&self, range: Range<usize>) -> FeatureFrame {
        let end = range.end.min(self.len());
        let start = range.start.min(end);
        FeatureFrame {
            columns: self.columns.clone(),
            timestamps: self.timestamps[start..end].to_vec(),
            rows: self.rows[start..end].to_vec(),
        }
    }

    /// Values of the schema's columns, in schema order, for every row.
    pub fn select(&self, schema: &FeatureSchema) -> Result<Vec<Vec<f64>>, ForecastError> {
        let indices = schema.indices_in(&self.columns)?;
        Ok(self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i]).collect())
            .collect())
    }

    /// First (row, column) holding a NaN or infinite value.
    pub fn first_undefined(&self) -> Option<(usize, &str)> {
        self.rows.iter().enumerate().find_map(|(row, values)| {
            values
                .iter()
                .position(|v| !v.is_finite())
                .map(|col| (row, self.columns[col].as_str()))
        })
    }

    /// Fails with `UndefinedValue` if any cell is NaN or infinite.
    pub fn ensure_defined(&self) -> Result<(), ForecastError> {
        match self.first_undefined() {
            Some((row, column)) => Err(ForecastError::UndefinedValue {
                column: column.to_string(),
                row,
            }),
            None => Ok(()),
        }
    }
}
