//! Regressors mapping an aligned feature frame to sales predictions

use crate::error::{ForecastError, Result};
use feature_align::store::{read_json, write_json_atomic};
use feature_align::{AlignError, FeatureFrame};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::path::Path;
use std::sync::Arc;

/// A fitted regressor, ready to score aligned frames
pub trait TrainedRegressor: Debug + Send + Sync {
    /// Predict one value per row of `features`
    ///
    /// `features` must carry exactly the columns the model was fitted on,
    /// in the same order.
    fn predict(&self, features: &FeatureFrame) -> Result<Vec<f64>>;

    /// Columns the model was fitted on
    fn feature_names(&self) -> &[String];

    /// Name of the model
    fn name(&self) -> &str;
}

/// A regressor that can be fitted on an aligned feature frame
pub trait Regressor: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedRegressor + Clone + Into<ModelArtifact>;

    /// Fit on `features` against `target`, one target per row
    fn fit(&self, features: &FeatureFrame, target: &[f64]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> &str;
}

/// Row-major values of `features`, checking the column layout against `expected`
pub(crate) fn feature_rows(expected: &[String], features: &FeatureFrame) -> Result<Vec<Vec<f64>>> {
    let present = features.column_names();
    if present.as_slice() != expected {
        return Err(ForecastError::Align(AlignError::SchemaMismatch(format!(
            "model expects {} columns, frame has {}{}",
            expected.len(),
            present.len(),
            first_difference(expected, &present)
                .map(|(i, e, p)| format!(" (position {}: expected '{}', found '{}')", i, e, p))
                .unwrap_or_default()
        ))));
    }
    Ok(features.rows()?)
}

fn first_difference<'a>(
    expected: &'a [String],
    present: &'a [String],
) -> Option<(usize, &'a str, &'a str)> {
    expected
        .iter()
        .zip(present.iter())
        .enumerate()
        .find(|(_, (e, p))| e != p)
        .map(|(i, (e, p))| (i, e.as_str(), p.as_str()))
}

/// Hyperparameters selecting the model family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "model_type", rename_all = "snake_case")]
pub enum ModelParams {
    GradientBoosting(GradientBoostingParams),
    Linear(LinearParams),
}

impl Default for ModelParams {
    fn default() -> Self {
        ModelParams::GradientBoosting(GradientBoostingParams::default())
    }
}

/// A persisted trained model of any supported family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ModelArtifact {
    GradientBoosting(TrainedGradientBoosting),
    Linear(TrainedLinearRegression),
}

impl ModelArtifact {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Ok(write_json_atomic(self, path.as_ref())?)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let artifact: Self = read_json(path.as_ref())?;
        if let ModelArtifact::GradientBoosting(model) = &artifact {
            model.check()?;
        }
        Ok(artifact)
    }

    pub fn feature_names(&self) -> &[String] {
        self.as_regressor().feature_names()
    }

    pub fn as_regressor(&self) -> &dyn TrainedRegressor {
        match self {
            ModelArtifact::GradientBoosting(model) => model,
            ModelArtifact::Linear(model) => model,
        }
    }

    /// Share the model behind the trained-regressor capability
    pub fn into_shared(self) -> Arc<dyn TrainedRegressor> {
        match self {
            ModelArtifact::GradientBoosting(model) => Arc::new(model),
            ModelArtifact::Linear(model) => Arc::new(model),
        }
    }
}

impl From<TrainedGradientBoosting> for ModelArtifact {
    fn from(model: TrainedGradientBoosting) -> Self {
        ModelArtifact::GradientBoosting(model)
    }
}

impl From<TrainedLinearRegression> for ModelArtifact {
    fn from(model: TrainedLinearRegression) -> Self {
        ModelArtifact::Linear(model)
    }
}

pub mod gradient_boosting;
pub mod linear;

pub use gradient_boosting::{GradientBoosting, GradientBoostingParams, TrainedGradientBoosting};
pub use linear::{LinearParams, LinearRegression, TrainedLinearRegression};
