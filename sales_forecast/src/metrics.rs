//! Metrics for evaluating sales predictions

use crate::error::{ForecastError, Result};
use feature_align::store::write_json_atomic;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Mean absolute error; NaN when the inputs are empty or of unequal length
pub fn mean_absolute_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }

    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).abs())
        .sum::<f64>()
        / actual.len() as f64
}

/// Mean squared error; NaN when the inputs are empty or of unequal length
pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }

    actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (a - p).powi(2))
        .sum::<f64>()
        / actual.len() as f64
}

pub fn root_mean_squared_error(actual: &[f64], predicted: &[f64]) -> f64 {
    mean_squared_error(actual, predicted).sqrt()
}

/// Root mean squared log error
///
/// Negative predictions are clipped to zero before taking `ln(1 + x)`.
pub fn root_mean_squared_log_error(actual: &[f64], predicted: &[f64]) -> f64 {
    if actual.len() != predicted.len() || actual.is_empty() {
        return f64::NAN;
    }

    let msle = actual
        .iter()
        .zip(predicted.iter())
        .map(|(a, p)| (p.max(0.0).ln_1p() - a.ln_1p()).powi(2))
        .sum::<f64>()
        / actual.len() as f64;
    msle.sqrt()
}

/// Validation metrics of a training run
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub rmse: f64,
    pub mae: f64,
    pub rmsle: f64,
}

impl EvaluationMetrics {
    /// Score `predicted` against `actual`
    pub fn evaluate(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.len() != predicted.len() || actual.is_empty() {
            return Err(ForecastError::DataError(format!(
                "cannot evaluate {} predictions against {} actual values",
                predicted.len(),
                actual.len()
            )));
        }
        if let Some(bad) = actual.iter().find(|a| **a < 0.0) {
            return Err(ForecastError::DataError(format!(
                "actual sales must be non-negative, got {}",
                bad
            )));
        }

        Ok(Self {
            rmse: root_mean_squared_error(actual, predicted),
            mae: mean_absolute_error(actual, predicted),
            rmsle: root_mean_squared_log_error(actual, predicted),
        })
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        Ok(write_json_atomic(self, path.as_ref())?)
    }
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Evaluation Metrics:")?;
        writeln!(f, "  RMSE:  {:.4}", self.rmse)?;
        writeln!(f, "  MAE:   {:.4}", self.mae)?;
        write!(f, "  RMSLE: {:.4}", self.rmsle)
    }
}
