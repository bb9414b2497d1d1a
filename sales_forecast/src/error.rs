//! Error types for the sales_forecast crate

use crate::pipeline::Stage;
use feature_align::AlignError;
use polars::prelude::PolarsError;
use thiserror::Error;

/// Custom error types for the sales_forecast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Error related to raw data validation or merging
    #[error("Data error: {0}")]
    DataError(String),

    /// Error raised while fitting or applying a regressor
    #[error("Model error: {0}")]
    ModelError(String),

    /// Error from invalid parameters
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Error from feature building or alignment
    #[error(transparent)]
    Align(#[from] AlignError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from reading or writing CSV tables
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from JSON (de)serialization
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// A training stage failed
    #[error("Stage {stage} failed: {source}")]
    StageFailed {
        stage: Stage,
        #[source]
        source: Box<ForecastError>,
    },
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl ForecastError {
    /// The underlying alignment error, if this error carries one
    pub fn as_align_error(&self) -> Option<&AlignError> {
        match self {
            ForecastError::Align(err) => Some(err),
            ForecastError::StageFailed { source, .. } => source.as_align_error(),
            _ => None,
        }
    }
}
