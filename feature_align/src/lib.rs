//! # Feature Align
//!
//! Feature building and schema alignment shared by the sales training
//! pipeline and the prediction service.
//!
//! The same [`FeatureBuilder`] runs over the full training corpus and over a
//! single prediction request. The training run fits a [`ColumnAligner`] once,
//! which captures the ordered column [`Schema`] and a [`MinMaxScaler`]; the
//! serving path reloads both and reshapes every incoming frame to exactly the
//! layout the model was trained on.
//!
//! ## Usage Example
//!
//! ```no_run
//! use feature_align::{ColumnAligner, FeatureBuilder, RecordInput};
//!
//! # fn run(training: Vec<feature_align::SalesRecord>) -> feature_align::Result<()> {
//! let builder = FeatureBuilder::new();
//! let train_frame = builder.build(&training)?;
//! let (aligner, _scaled_train) = ColumnAligner::fit(&train_frame)?;
//!
//! let request = RecordInput {
//!     date: Some("2017-08-16".to_string()),
//!     family: Some("GROCERY I".to_string()),
//!     state: Some("Pichincha".to_string()),
//!     city: Some("Quito".to_string()),
//!     type_x: Some("D".to_string()),
//!     store_nbr: Some(1),
//!     ..RecordInput::default()
//! };
//! let row = builder.build_one(&request.into_record()?)?;
//! let aligned = aligner.align(row)?;
//! assert_eq!(aligned.column_names(), aligner.schema().expected_columns());
//! # Ok(())
//! # }
//! ```

use std::path::PathBuf;
use thiserror::Error;

pub mod aligner;
pub mod builder;
pub mod frame;
pub mod history;
pub mod record;
pub mod scaler;
pub mod schema;
pub mod store;

pub use aligner::ColumnAligner;
pub use builder::{fill_missing, CalendarFeatures, Expansion, FeatureBuilder};
pub use frame::{FeatureFrame, FeatureTable};
pub use history::HistoryConfig;
pub use record::{RecordInput, SalesRecord};
pub use scaler::MinMaxScaler;
pub use schema::{detect_scale_columns, Schema, SCALE_COLUMN_PATTERNS};
pub use store::ScalerStore;

/// Errors raised while building, aligning or persisting features
#[derive(Error, Debug)]
pub enum AlignError {
    #[error("Malformed input: {0}")]
    MalformedInput(String),

    #[error("Schema mismatch: {0}")]
    SchemaMismatch(String),

    #[error("Artifact missing: {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Polars error: {0}")]
    Polars(String),
}

impl From<polars::prelude::PolarsError> for AlignError {
    fn from(err: polars::prelude::PolarsError) -> Self {
        AlignError::Polars(err.to_string())
    }
}

/// Result type for feature alignment operations
pub type Result<T> = std::result::Result<T, AlignError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AlignError::SchemaMismatch("3 scale columns, scaler fitted on 2".to_string());
        assert!(err.to_string().contains("Schema mismatch"));

        let err = AlignError::ArtifactMissing(PathBuf::from("/tmp/none/scaler.json"));
        assert!(err.to_string().contains("/tmp/none/scaler.json"));
    }
}
