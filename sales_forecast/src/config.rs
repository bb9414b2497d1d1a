//! Training run configuration

use crate::data::DataFiles;
use crate::error::{ForecastError, Result};
use crate::models::ModelParams;
use feature_align::HistoryConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

/// Everything a training run needs to know
///
/// Every field has a default, so a JSON file only has to name what it
/// overrides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    /// Directory holding the raw CSV tables
    pub data_dir: PathBuf,
    /// File names of the raw tables
    pub files: DataFiles,
    /// Directory receiving merged tables, feature tables and the submission
    pub output_dir: PathBuf,
    /// Root of the versioned artifact store
    pub artifact_dir: PathBuf,
    /// Rows of this year are held out for evaluation; earlier rows are fitted
    pub validation_year: i32,
    /// Historical sales features to derive
    pub history: HistoryConfig,
    /// Model family and hyperparameters
    pub model: ModelParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data/raw"),
            files: DataFiles::default(),
            output_dir: PathBuf::from("data/processed"),
            artifact_dir: PathBuf::from("artifacts"),
            validation_year: 2017,
            history: HistoryConfig::default(),
            model: ModelParams::default(),
        }
    }
}

impl TrainingConfig {
    /// Load a configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| {
            ForecastError::InvalidParameter(format!(
                "cannot open config '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: Self = serde_json::from_reader(BufReader::new(file))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.history.lags.iter().chain(&self.history.rolling_windows).any(|&w| w == 0) {
            return Err(ForecastError::InvalidParameter(
                "lags and rolling windows must be at least one day".to_string(),
            ));
        }
        for (label, values) in [
            ("lag", &self.history.lags),
            ("rolling window", &self.history.rolling_windows),
        ] {
            let mut seen = HashSet::with_capacity(values.len());
            if let Some(repeated) = values.iter().find(|&&v| !seen.insert(v)) {
                return Err(ForecastError::InvalidParameter(format!(
                    "{} {} is listed more than once",
                    label, repeated
                )));
            }
        }
        if !(1900..=2100).contains(&self.validation_year) {
            return Err(ForecastError::InvalidParameter(format!(
                "validation_year {} is out of range",
                self.validation_year
            )));
        }
        Ok(())
    }

    pub fn merged_dir(&self) -> PathBuf {
        self.output_dir.join("merged")
    }

    pub fn features_dir(&self) -> PathBuf {
        self.output_dir.join("features")
    }

    pub fn submission_path(&self) -> PathBuf {
        self.output_dir.join("submission.csv")
    }
}
