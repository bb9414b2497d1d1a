//! Numeric feature frames backed by polars

use crate::{AlignError, Result};
use chrono::NaiveDate;
use polars::prelude::*;
use std::fs::File;
use std::path::Path;

/// A table of `f64` feature columns
///
/// A frame remembers the fingerprint of the [`crate::Schema`] it was aligned
/// against, which is what makes a second alignment a no-op.
#[derive(Debug, Clone)]
pub struct FeatureFrame {
    df: DataFrame,
    aligned_to: Option<u64>,
}

impl FeatureFrame {
    /// Create a frame from named columns of equal length
    pub fn from_columns(columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let series: Vec<Series> = columns
            .into_iter()
            .map(|(name, values)| Series::new(name.as_str(), values))
            .collect();
        let df = DataFrame::new(series)?;

        Ok(Self {
            df,
            aligned_to: None,
        })
    }

    /// Wrap an existing DataFrame, casting every column to `f64`
    pub fn from_dataframe(df: DataFrame) -> Result<Self> {
        let mut columns = Vec::with_capacity(df.width());
        for series in df.get_columns() {
            columns.push(series.cast(&DataType::Float64)?);
        }

        Ok(Self {
            df: DataFrame::new(columns)?,
            aligned_to: None,
        })
    }

    /// Get the DataFrame
    pub fn dataframe(&self) -> &DataFrame {
        &self.df
    }

    /// Column names in frame order
    pub fn column_names(&self) -> Vec<String> {
        self.df
            .get_column_names()
            .into_iter()
            .map(|name| name.to_string())
            .collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.df.get_column_names().contains(&name)
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.df.height()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.df.width()
    }

    pub fn is_empty(&self) -> bool {
        self.df.height() == 0
    }

    /// Fingerprint of the schema this frame was aligned against, if any
    pub fn aligned_to(&self) -> Option<u64> {
        self.aligned_to
    }

    pub(crate) fn mark_aligned(mut self, fingerprint: u64) -> Self {
        self.aligned_to = Some(fingerprint);
        self
    }

    /// Values of a single column
    pub fn column(&self, name: &str) -> Result<Vec<f64>> {
        let series = self.df.column(name).map_err(|_| {
            AlignError::SchemaMismatch(format!("column '{}' not found in frame", name))
        })?;
        series_values(series)
    }

    /// Row-major copy of the frame
    pub fn rows(&self) -> Result<Vec<Vec<f64>>> {
        let columns = self
            .df
            .get_columns()
            .iter()
            .map(series_values)
            .collect::<Result<Vec<_>>>()?;

        let mut rows = vec![Vec::with_capacity(columns.len()); self.height()];
        for column in &columns {
            for (row, value) in rows.iter_mut().zip(column.iter()) {
                row.push(*value);
            }
        }

        Ok(rows)
    }

    /// Keep the rows where `mask` is true
    pub fn filter_rows(&self, mask: &[bool]) -> Result<Self> {
        if mask.len() != self.height() {
            return Err(AlignError::MalformedInput(format!(
                "row mask length ({}) doesn't match frame height ({})",
                mask.len(),
                self.height()
            )));
        }
        let mask_series = Series::new("mask", mask.to_vec());
        let df = self.df.filter(mask_series.bool()?)?;

        Ok(Self {
            df,
            aligned_to: self.aligned_to,
        })
    }

    /// Append columns to the right of the frame
    pub fn with_columns(&self, columns: Vec<(String, Vec<f64>)>) -> Result<Self> {
        let mut df = self.df.clone();
        for (name, values) in columns {
            if values.len() != df.height() && df.width() > 0 {
                return Err(AlignError::MalformedInput(format!(
                    "column '{}' has {} values, frame has {} rows",
                    name,
                    values.len(),
                    df.height()
                )));
            }
            df.with_column(Series::new(name.as_str(), values))?;
        }

        Ok(Self {
            df,
            aligned_to: None,
        })
    }

    pub(crate) fn replace_dataframe(&self, df: DataFrame) -> Self {
        Self {
            df,
            aligned_to: self.aligned_to,
        }
    }
}

impl PartialEq for FeatureFrame {
    fn eq(&self, other: &Self) -> bool {
        self.aligned_to == other.aligned_to && self.df.frame_equal(&other.df)
    }
}

/// Read a series as `f64` values, rejecting nulls
pub(crate) fn series_values(series: &Series) -> Result<Vec<f64>> {
    let cast = series.cast(&DataType::Float64)?;
    let values = cast.f64()?;
    values
        .into_iter()
        .map(|value| {
            value.ok_or_else(|| {
                AlignError::MalformedInput(format!(
                    "column '{}' contains missing values",
                    series.name()
                ))
            })
        })
        .collect()
}

/// A feature frame together with the per-row keys that are not features
#[derive(Debug, Clone)]
pub struct FeatureTable {
    /// Model inputs
    pub frame: FeatureFrame,
    /// Row dates
    pub dates: Vec<NaiveDate>,
    /// Source row ids
    pub ids: Vec<Option<i64>>,
    /// Units sold, absent for rows to be scored
    pub targets: Vec<Option<f64>>,
}

impl FeatureTable {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    /// Keep the rows where `mask` is true
    pub fn select(&self, mask: &[bool]) -> Result<Self> {
        let frame = self.frame.filter_rows(mask)?;
        let keep = |i: &usize| mask[*i];

        Ok(Self {
            frame,
            dates: (0..self.len()).filter(keep).map(|i| self.dates[i]).collect(),
            ids: (0..self.len()).filter(keep).map(|i| self.ids[i]).collect(),
            targets: (0..self.len()).filter(keep).map(|i| self.targets[i]).collect(),
        })
    }

    /// Replace the feature frame, keeping the row keys
    pub fn with_frame(&self, frame: FeatureFrame) -> Result<Self> {
        if frame.height() != self.len() {
            return Err(AlignError::MalformedInput(format!(
                "frame has {} rows, table has {}",
                frame.height(),
                self.len()
            )));
        }

        Ok(Self {
            frame,
            dates: self.dates.clone(),
            ids: self.ids.clone(),
            targets: self.targets.clone(),
        })
    }

    /// Targets for every row, failing on rows without one
    pub fn target_values(&self) -> Result<Vec<f64>> {
        self.targets
            .iter()
            .zip(self.dates.iter())
            .map(|(target, date)| {
                target.ok_or_else(|| {
                    AlignError::MalformedInput(format!("row dated {} has no sales value", date))
                })
            })
            .collect()
    }

    /// Write the table as CSV: id, date, the feature columns, then sales
    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut columns = Vec::with_capacity(self.frame.width() + 3);
        columns.push(Series::new("id", self.ids.clone()));
        columns.push(Series::new(
            "date",
            self.dates
                .iter()
                .map(|d| d.format("%Y-%m-%d").to_string())
                .collect::<Vec<String>>(),
        ));
        columns.extend(self.frame.dataframe().get_columns().iter().cloned());
        columns.push(Series::new("sales", self.targets.clone()));

        let mut df = DataFrame::new(columns)?;
        let mut file = File::create(path)?;
        CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> FeatureFrame {
        FeatureFrame::from_columns(vec![
            ("a".to_string(), vec![1.0, 2.0, 3.0]),
            ("b".to_string(), vec![10.0, 20.0, 30.0]),
        ])
        .unwrap()
    }

    #[test]
    fn test_rows_are_row_major() {
        let rows = frame().rows().unwrap();
        assert_eq!(rows, vec![vec![1.0, 10.0], vec![2.0, 20.0], vec![3.0, 30.0]]);
    }

    #[test]
    fn test_filter_rows() {
        let filtered = frame().filter_rows(&[true, false, true]).unwrap();
        assert_eq!(filtered.column("b").unwrap(), vec![10.0, 30.0]);
        assert!(frame().filter_rows(&[true]).is_err());
    }

    #[test]
    fn test_missing_column_is_schema_mismatch() {
        assert!(matches!(
            frame().column("c"),
            Err(AlignError::SchemaMismatch(_))
        ));
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let result = FeatureFrame::from_columns(vec![
            ("a".to_string(), vec![1.0]),
            ("a".to_string(), vec![2.0]),
        ]);
        assert!(result.is_err());
    }
}
