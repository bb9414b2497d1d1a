//! The column layout a trained model expects

use crate::{AlignError, Result};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};

/// Name fragments that mark a column for min-max scaling
pub const SCALE_COLUMN_PATTERNS: [&str; 6] = [
    "sales_lag_",
    "sales_roll",
    "sales_expanding",
    "onpromotion_trend",
    "dcoilwtico",
    "transactions",
];

/// Columns whose name contains any of [`SCALE_COLUMN_PATTERNS`], in input order
pub fn detect_scale_columns<S: AsRef<str>>(columns: &[S]) -> Vec<String> {
    columns
        .iter()
        .map(|c| c.as_ref())
        .filter(|c| SCALE_COLUMN_PATTERNS.iter().any(|p| c.contains(p)))
        .map(|c| c.to_string())
        .collect()
}

/// Ordered model inputs plus the exact subset the scaler was fitted on
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    expected_columns: Vec<String>,
    scale_columns: Vec<String>,
}

impl Schema {
    pub fn new(expected_columns: Vec<String>, scale_columns: Vec<String>) -> Result<Self> {
        let schema = Self {
            expected_columns,
            scale_columns,
        };
        schema.validate()?;
        Ok(schema)
    }

    /// Schema for `expected_columns`, scaling the pattern-matched ones
    pub fn from_columns(expected_columns: Vec<String>) -> Result<Self> {
        let scale_columns = detect_scale_columns(&expected_columns);
        Self::new(expected_columns, scale_columns)
    }

    /// Check the invariants a deserialized schema must also satisfy
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.expected_columns.len());
        for column in &self.expected_columns {
            if !seen.insert(column.as_str()) {
                return Err(AlignError::SchemaMismatch(format!(
                    "column '{}' appears twice in the schema",
                    column
                )));
            }
        }

        let positions: Vec<usize> = self
            .scale_columns
            .iter()
            .map(|c| {
                self.expected_columns
                    .iter()
                    .position(|e| e == c)
                    .ok_or_else(|| {
                        AlignError::SchemaMismatch(format!(
                            "scale column '{}' is not a schema column",
                            c
                        ))
                    })
            })
            .collect::<Result<_>>()?;
        if positions.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AlignError::SchemaMismatch(
                "scale columns are not in schema order".to_string(),
            ));
        }

        Ok(())
    }

    pub fn expected_columns(&self) -> &[String] {
        &self.expected_columns
    }

    pub fn scale_columns(&self) -> &[String] {
        &self.scale_columns
    }

    pub fn len(&self) -> usize {
        self.expected_columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expected_columns.is_empty()
    }

    /// In-process identity of the schema, used to tag aligned frames
    pub fn fingerprint(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.expected_columns.hash(&mut hasher);
        self.scale_columns.hash(&mut hasher);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|v| v.to_string()).collect()
    }

    #[test]
    fn test_detect_scale_columns() {
        let columns = names(&[
            "store_nbr",
            "transactions",
            "dcoilwtico",
            "onpromotion",
            "onpromotion_trend",
            "sales_lag_7",
            "sales_roll_mean_14",
            "sales_expanding_mean",
            "family_BEVERAGES",
        ]);
        assert_eq!(
            detect_scale_columns(&columns),
            names(&[
                "transactions",
                "dcoilwtico",
                "onpromotion_trend",
                "sales_lag_7",
                "sales_roll_mean_14",
                "sales_expanding_mean",
            ])
        );
    }

    #[test]
    fn test_unknown_scale_column_rejected() {
        let result = Schema::new(names(&["a", "b"]), names(&["c"]));
        assert!(matches!(result, Err(AlignError::SchemaMismatch(_))));
    }

    #[test]
    fn test_duplicate_column_rejected() {
        let result = Schema::new(names(&["a", "a"]), Vec::new());
        assert!(matches!(result, Err(AlignError::SchemaMismatch(_))));
    }

    #[test]
    fn test_fingerprint_tracks_layout() {
        let a = Schema::from_columns(names(&["year", "transactions"])).unwrap();
        let b = Schema::from_columns(names(&["transactions", "year"])).unwrap();
        assert_eq!(a.fingerprint(), a.clone().fingerprint());
        assert_ne!(a.fingerprint(), b.fingerprint());
    }
}
