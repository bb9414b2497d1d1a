//! Min-max scaling of the designated numeric columns

use crate::frame::{series_values, FeatureFrame};
use crate::{AlignError, Result};
use polars::prelude::*;
use serde::{Deserialize, Serialize};

/// Min-max scaler mapping each fitted column onto `[0, 1]` over its training range
///
/// A column that was constant during fitting keeps a unit range, so it is
/// only shifted by its minimum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MinMaxScaler {
    columns: Vec<String>,
    data_min: Vec<f64>,
    data_max: Vec<f64>,
}

impl MinMaxScaler {
    /// Fit on `columns` of `frame`
    pub fn fit(frame: &FeatureFrame, columns: &[String]) -> Result<Self> {
        if frame.is_empty() && !columns.is_empty() {
            return Err(AlignError::MalformedInput(
                "cannot fit a scaler on an empty frame".to_string(),
            ));
        }

        let mut data_min = Vec::with_capacity(columns.len());
        let mut data_max = Vec::with_capacity(columns.len());
        for name in columns {
            let values = frame.column(name)?;
            let min = values.iter().copied().fold(f64::INFINITY, f64::min);
            let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
            if !min.is_finite() || !max.is_finite() {
                return Err(AlignError::MalformedInput(format!(
                    "column '{}' has non-finite values",
                    name
                )));
            }
            data_min.push(min);
            data_max.push(max);
        }

        Ok(Self {
            columns: columns.to_vec(),
            data_min,
            data_max,
        })
    }

    /// Check the invariants a deserialized scaler must also satisfy
    pub fn validate(&self) -> Result<()> {
        let n = self.columns.len();
        if self.data_min.len() != n || self.data_max.len() != n {
            return Err(AlignError::SchemaMismatch(format!(
                "scaler lists {} columns but {} minima and {} maxima",
                n,
                self.data_min.len(),
                self.data_max.len()
            )));
        }
        for ((name, min), max) in self.columns.iter().zip(&self.data_min).zip(&self.data_max) {
            if !min.is_finite() || !max.is_finite() || min > max {
                return Err(AlignError::SchemaMismatch(format!(
                    "scaler range for '{}' is invalid: [{}, {}]",
                    name, min, max
                )));
            }
        }
        Ok(())
    }

    /// Columns the scaler was fitted on, in fitting order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn n_features(&self) -> usize {
        self.columns.len()
    }

    pub fn data_min(&self) -> &[f64] {
        &self.data_min
    }

    pub fn data_max(&self) -> &[f64] {
        &self.data_max
    }

    fn range(&self, idx: usize) -> f64 {
        let range = self.data_max[idx] - self.data_min[idx];
        if range == 0.0 {
            1.0
        } else {
            range
        }
    }

    /// Scale one value of the `idx`-th fitted column
    pub fn transform_value(&self, idx: usize, value: f64) -> f64 {
        (value - self.data_min[idx]) / self.range(idx)
    }

    /// Undo [`MinMaxScaler::transform_value`]
    pub fn inverse_transform_value(&self, idx: usize, scaled: f64) -> f64 {
        scaled * self.range(idx) + self.data_min[idx]
    }

    /// Scale `columns` of `frame`, leaving the other columns untouched
    ///
    /// `columns` must name exactly the fitted columns, in fitting order.
    pub fn transform(&self, frame: &FeatureFrame, columns: &[String]) -> Result<FeatureFrame> {
        if columns.len() != self.n_features() {
            return Err(AlignError::SchemaMismatch(format!(
                "scaler was fitted on {} columns, {} selected",
                self.n_features(),
                columns.len()
            )));
        }
        if columns != self.columns.as_slice() {
            return Err(AlignError::SchemaMismatch(format!(
                "selected scale columns {:?} differ from fitted columns {:?}",
                columns, self.columns
            )));
        }

        let mut df = frame.dataframe().clone();
        for (idx, name) in self.columns.iter().enumerate() {
            let series = df.column(name).map_err(|_| {
                AlignError::SchemaMismatch(format!("scale column '{}' not found in frame", name))
            })?;
            let scaled: Vec<f64> = series_values(series)?
                .into_iter()
                .map(|v| self.transform_value(idx, v))
                .collect();
            df.with_column(Series::new(name.as_str(), scaled))?;
        }

        Ok(frame.replace_dataframe(df))
    }
}
