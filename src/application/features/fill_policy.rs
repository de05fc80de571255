use std::collections::HashMap;

/// What happens to an undefined (NaN) value in a base column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FillPolicy {
    /// Replace with 0.0 (e.g. neutral sentiment for a date without news).
    ZeroFill,
    /// Leave undefined; the row is dropped when the feature table is finalised.
    DropRow,
}

/// Named fill policy per column, defaulting to [`FillPolicy::DropRow`].
#[derive(Debug, Clone, Default)]
pub struct FillPolicyTable {
    overrides: HashMap<String, FillPolicy>,
}

impl FillPolicyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn zero_fill<S: AsRef<str>>(columns: &[S]) -> Self {
        let mut table = Self::new();
        for column in columns {
            table.set(column.as_ref(), FillPolicy::ZeroFill);
        }
        table
    }

    pub fn set(&mut self, column: &str, policy: FillPolicy) {
        self.overrides.insert(column.to_string(), policy);
    }

    pub fn policy(&self, column: &str) -> FillPolicy {
        self.overrides
            .get(column)
            .copied()
            .unwrap_or(FillPolicy::DropRow)
    }

    /// Applies the table to one row laid out as `columns`; returns how many
    /// cells were zero-filled.
    pub fn apply(&self, columns: &[String], values: &mut [f64]) -> usize {
        let mut filled = 0;
        for (column, value) in columns.iter().zip(values.iter_mut()) {
            if value.is_nan() && self.policy(column) == FillPolicy::ZeroFill {
                *value = 0.0;
                filled += 1;
            }
        }
        filled
    }
}
