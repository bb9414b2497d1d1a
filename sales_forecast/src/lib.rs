//! # Sales Forecast
//!
//! Training pipeline, regressors and analytics for per-store, per-family
//! daily sales forecasting.
//!
//! ## Features
//!
//! - Loading and merging the raw sales, store, transaction, oil and holiday tables
//! - Gradient-boosted trees and ridge regression behind one trait pair
//! - A staged training run that fits the feature aligner once, evaluates on a
//!   held-out year and promotes a versioned set of artifacts
//! - Descriptive aggregations over the merged sales
//!
//! ## Quick Start
//!
//! ```no_run
//! use sales_forecast::{RunOutcome, TrainingConfig, TrainingOrchestrator};
//!
//! let config = TrainingConfig::default();
//! match TrainingOrchestrator::new(config).run() {
//!     RunOutcome::Completed(report) => println!("{}", report.metrics),
//!     RunOutcome::Failed { stage, cause } => eprintln!("{} failed: {}", stage, cause),
//! }
//! ```

pub mod analytics;
pub mod artifacts;
pub mod config;
pub mod data;
pub mod error;
pub mod metrics;
pub mod models;
pub mod pipeline;

// Re-export commonly used types
pub use crate::artifacts::{ArtifactStore, RunArtifacts};
pub use crate::config::TrainingConfig;
pub use crate::data::{RawDataMerger, RawTables};
pub use crate::error::{ForecastError, Result};
pub use crate::metrics::EvaluationMetrics;
pub use crate::models::{ModelArtifact, ModelParams, Regressor, TrainedRegressor};
pub use crate::pipeline::{RunOutcome, RunReport, Stage, TrainingOrchestrator};

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
