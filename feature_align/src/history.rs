//! Lag, rolling and expanding sales features
//!
//! These need the sales history of a (store, family) series, so they only
//! exist for batch builds. A single prediction request never carries them and
//! the aligner zero-fills them.

use crate::record::SalesRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which historical sales features to derive
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryConfig {
    /// Lags in days, e.g. `[7, 14]`
    #[serde(default)]
    pub lags: Vec<usize>,
    /// Rolling-mean windows in days
    #[serde(default)]
    pub rolling_windows: Vec<usize>,
    /// Mean of all earlier observations
    #[serde(default)]
    pub expanding_mean: bool,
}

impl HistoryConfig {
    pub fn is_enabled(&self) -> bool {
        !self.lags.is_empty() || !self.rolling_windows.is_empty() || self.expanding_mean
    }

    /// Names of the columns [`HistoryConfig::compute`] produces, in order
    pub fn column_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.lags.iter().map(|k| format!("sales_lag_{}", k)).collect();
        names.extend(
            self.rolling_windows
                .iter()
                .map(|w| format!("sales_roll_mean_{}", w)),
        );
        if self.expanding_mean {
            names.push("sales_expanding_mean".to_string());
        }
        names
    }

    /// Derive the configured columns, aligned with `records`
    ///
    /// Each series is ordered by date and only strictly earlier observations
    /// contribute to a row. Positions without enough history, and rows whose
    /// earlier sales are unknown, get 0.0.
    pub fn compute(&self, records: &[SalesRecord]) -> Vec<(String, Vec<f64>)> {
        if !self.is_enabled() {
            return Vec::new();
        }

        let mut series: HashMap<(i64, &str), Vec<usize>> = HashMap::new();
        for (i, record) in records.iter().enumerate() {
            series
                .entry((record.store_nbr, record.family.as_str()))
                .or_default()
                .push(i);
        }

        let names = self.column_names();
        let mut columns = vec![vec![0.0; records.len()]; names.len()];

        for indices in series.values_mut() {
            indices.sort_by_key(|&i| records[i].date);
            let history: Vec<Option<f64>> = indices.iter().map(|&i| records[i].sales).collect();

            for (pos, &row) in indices.iter().enumerate() {
                let mut col = 0;
                for &lag in &self.lags {
                    if lag > 0 && pos >= lag {
                        columns[col][row] = history[pos - lag].unwrap_or(0.0);
                    }
                    col += 1;
                }
                for &window in &self.rolling_windows {
                    let start = pos.saturating_sub(window);
                    columns[col][row] = known_mean(&history[start..pos]);
                    col += 1;
                }
                if self.expanding_mean {
                    columns[col][row] = known_mean(&history[..pos]);
                }
            }
        }

        names.into_iter().zip(columns).collect()
    }
}

fn known_mean(values: &[Option<f64>]) -> f64 {
    let known: Vec<f64> = values.iter().flatten().copied().collect();
    if known.is_empty() {
        0.0
    } else {
        known.iter().sum::<f64>() / known.len() as f64
    }
}
