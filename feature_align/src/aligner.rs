//! Reconciling feature frames with the trained schema
//!
//! Fit mode runs once per training run and captures the [`Schema`] and the
//! [`MinMaxScaler`]. Serve mode reshapes any frame to that schema:
//!
//! 1. schema columns missing from the frame are added as 0.0
//! 2. columns outside the schema are dropped
//! 3. columns are reordered to schema order
//! 4. the persisted scale-column list is checked against the scaler and
//!    against the scale patterns applied to the aligned columns
//! 5. the scaler is applied with `transform`, never refitted
//!
//! Zero-filling happens before scaling, so an absent column ends up at the
//! scaled position of zero, not at zero.

use crate::frame::FeatureFrame;
use crate::scaler::MinMaxScaler;
use crate::schema::{detect_scale_columns, Schema};
use crate::{AlignError, Result};
use polars::prelude::*;
use tracing::{debug, error};

/// Aligns frames to a fitted schema and scaler
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnAligner {
    schema: Schema,
    scaler: MinMaxScaler,
}

impl ColumnAligner {
    /// Capture the schema of `training` and fit the scaler on it
    ///
    /// Returns the aligner together with the scaled training frame.
    pub fn fit(training: &FeatureFrame) -> Result<(Self, FeatureFrame)> {
        if training.aligned_to().is_some() {
            return Err(AlignError::SchemaMismatch(
                "refusing to fit on a frame that is already aligned and scaled".to_string(),
            ));
        }

        let schema = Schema::from_columns(training.column_names())?;
        let scaler = MinMaxScaler::fit(training, schema.scale_columns())?;
        debug!(
            columns = schema.len(),
            scaled = scaler.n_features(),
            "fitted column aligner"
        );

        let aligner = Self { schema, scaler };
        let scaled = aligner
            .scaler
            .transform(training, aligner.schema.scale_columns())?
            .mark_aligned(aligner.schema.fingerprint());

        Ok((aligner, scaled))
    }

    /// Rebuild an aligner from persisted artifacts
    pub fn new(schema: Schema, scaler: MinMaxScaler) -> Result<Self> {
        schema.validate()?;
        scaler.validate()?;
        if scaler.columns() != schema.scale_columns() {
            error!(
                schema = ?schema.scale_columns(),
                scaler = ?scaler.columns(),
                "scaler and schema disagree on scale columns"
            );
            return Err(AlignError::SchemaMismatch(format!(
                "scaler was fitted on {:?}, schema lists {:?}",
                scaler.columns(),
                schema.scale_columns()
            )));
        }

        Ok(Self { schema, scaler })
    }

    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    pub fn scaler(&self) -> &MinMaxScaler {
        &self.scaler
    }

    /// Align and scale `frame` to the fitted schema
    ///
    /// A frame already aligned to this schema is returned unchanged.
    pub fn align(&self, frame: FeatureFrame) -> Result<FeatureFrame> {
        let fingerprint = self.schema.fingerprint();
        match frame.aligned_to() {
            Some(existing) if existing == fingerprint => return Ok(frame),
            Some(_) => {
                error!("frame was aligned against a different schema");
                return Err(AlignError::SchemaMismatch(
                    "frame was aligned against a different schema".to_string(),
                ));
            }
            None => {}
        }

        let reindexed = self.reindex(&frame)?;
        let scale_columns = self.scale_columns_for(&reindexed)?;
        let scaled = self.scaler.transform(&reindexed, &scale_columns)?;

        Ok(scaled.mark_aligned(fingerprint))
    }

    /// Add missing schema columns as zero, drop extras and reorder
    ///
    /// No scaling is applied.
    pub fn reindex(&self, frame: &FeatureFrame) -> Result<FeatureFrame> {
        let height = frame.height();
        let df = frame.dataframe();
        let present = frame.column_names();

        let mut columns = Vec::with_capacity(self.schema.len());
        let mut filled = 0usize;
        for name in self.schema.expected_columns() {
            if present.iter().any(|p| p == name) {
                columns.push(df.column(name)?.clone());
            } else {
                filled += 1;
                columns.push(Series::new(name.as_str(), vec![0.0_f64; height]));
            }
        }
        let dropped = present
            .iter()
            .filter(|p| !self.schema.expected_columns().contains(p))
            .count();
        debug!(filled, dropped, "reindexed frame to schema");

        let reindexed = FeatureFrame::from_dataframe(DataFrame::new(columns)?)?;
        Ok(reindexed)
    }

    fn scale_columns_for(&self, aligned: &FeatureFrame) -> Result<Vec<String>> {
        let persisted = self.schema.scale_columns().to_vec();
        let detected = detect_scale_columns(&aligned.column_names());

        if detected != persisted {
            error!(
                persisted = ?persisted,
                detected = ?detected,
                "scale-column patterns no longer match the fitted scaler"
            );
            return Err(AlignError::SchemaMismatch(format!(
                "scale columns {:?} detected, scaler was fitted on {:?}",
                detected, persisted
            )));
        }

        Ok(persisted)
    }
}
