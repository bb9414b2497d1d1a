//! Versioned artifact store
//!
//! Each training run writes into its own directory under `runs/`. Once every
//! artifact of the run is on disk, the `current` pointer file is replaced
//! atomically with the new run id. Readers resolve the pointer first, so they
//! see either the previous complete run or the new one.

use crate::error::{ForecastError, Result};
use crate::metrics::EvaluationMetrics;
use crate::models::ModelArtifact;
use chrono::Utc;
use feature_align::store::{read_json, SCALER_FILE, SCHEMA_FILE};
use feature_align::{AlignError, ColumnAligner, MinMaxScaler, Schema, ScalerStore};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// File name of the persisted model inside a run directory
pub const MODEL_FILE: &str = "model.json";
/// File name of the validation metrics inside a run directory
pub const METRICS_FILE: &str = "metrics.json";
/// Pointer file naming the run the service should load
pub const CURRENT_POINTER: &str = "current";
/// Directory holding one sub-directory per run
pub const RUNS_DIR: &str = "runs";
/// JSON-lines log of finished runs
pub const RUN_LOG: &str = "runs.jsonl";

/// Root of the artifact store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn run_dir(&self, run_id: &str) -> PathBuf {
        self.root.join(RUNS_DIR).join(run_id)
    }

    /// A fresh run id derived from the current UTC time
    pub fn new_run_id(&self) -> String {
        let base = Utc::now().format("%Y%m%dT%H%M%S%.3fZ").to_string();
        let mut run_id = base.clone();
        let mut suffix = 1;
        while self.run_dir(&run_id).exists() {
            run_id = format!("{}-{}", base, suffix);
            suffix += 1;
        }
        run_id
    }

    /// Write every artifact of a run, then point `current` at it
    pub fn persist_run(
        &self,
        run_id: &str,
        schema: &Schema,
        scaler: &MinMaxScaler,
        model: &ModelArtifact,
        metrics: &EvaluationMetrics,
    ) -> Result<PathBuf> {
        if model.feature_names() != schema.expected_columns() {
            return Err(AlignError::SchemaMismatch(
                "model was fitted on a different column layout than the schema".to_string(),
            )
            .into());
        }

        let run_dir = self.run_dir(run_id);
        if run_dir.exists() {
            return Err(ForecastError::DataError(format!(
                "run directory '{}' already exists",
                run_dir.display()
            )));
        }
        fs::create_dir_all(&run_dir)?;

        ScalerStore::save_schema(schema, &run_dir.join(SCHEMA_FILE))?;
        ScalerStore::save(scaler, &run_dir.join(SCALER_FILE))?;
        model.save(run_dir.join(MODEL_FILE))?;
        metrics.save(run_dir.join(METRICS_FILE))?;

        self.promote(run_id)?;
        info!(run_id, run_dir = %run_dir.display(), "promoted run artifacts");
        Ok(run_dir)
    }

    /// Atomically point `current` at `run_id`
    pub fn promote(&self, run_id: &str) -> Result<()> {
        if !self.run_dir(run_id).is_dir() {
            return Err(AlignError::ArtifactMissing(self.run_dir(run_id)).into());
        }
        fs::create_dir_all(&self.root)?;

        let pointer = self.root.join(CURRENT_POINTER);
        let temp = self.root.join(format!(".{}.tmp", CURRENT_POINTER));
        {
            let mut file = fs::File::create(&temp)?;
            writeln!(file, "{}", run_id)?;
            file.sync_all()?;
        }
        fs::rename(&temp, &pointer)?;
        Ok(())
    }

    /// Run id named by the `current` pointer
    pub fn current_run_id(&self) -> Result<String> {
        let pointer = self.root.join(CURRENT_POINTER);
        if !pointer.exists() {
            return Err(AlignError::ArtifactMissing(pointer).into());
        }
        let run_id = fs::read_to_string(&pointer)?.trim().to_string();
        if run_id.is_empty() {
            return Err(ForecastError::DataError(format!(
                "pointer '{}' is empty",
                pointer.display()
            )));
        }
        Ok(run_id)
    }

    /// Load the artifacts of the current run
    pub fn load_current(&self) -> Result<RunArtifacts> {
        let run_id = self.current_run_id()?;
        self.load_run(&run_id)
    }

    /// Load and cross-check the artifacts of `run_id`
    pub fn load_run(&self, run_id: &str) -> Result<RunArtifacts> {
        let run_dir = self.run_dir(run_id);
        let schema = ScalerStore::load_schema(&run_dir.join(SCHEMA_FILE))?;
        let scaler = ScalerStore::load(&run_dir.join(SCALER_FILE))?;
        let model = ModelArtifact::load(run_dir.join(MODEL_FILE))?;
        let metrics = match read_json::<EvaluationMetrics>(&run_dir.join(METRICS_FILE)) {
            Ok(metrics) => Some(metrics),
            Err(AlignError::ArtifactMissing(path)) => {
                warn!(path = %path.display(), "run has no metrics");
                None
            }
            Err(e) => return Err(e.into()),
        };

        if model.feature_names() != schema.expected_columns() {
            return Err(AlignError::SchemaMismatch(format!(
                "model of run {} expects {} columns, schema lists {}",
                run_id,
                model.feature_names().len(),
                schema.len()
            ))
            .into());
        }

        Ok(RunArtifacts {
            run_id: run_id.to_string(),
            schema,
            scaler,
            model,
            metrics,
        })
    }

    /// Append one entry to the run log
    pub fn append_run_log(&self, entry: &RunLogEntry) -> Result<()> {
        fs::create_dir_all(&self.root)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.root.join(RUN_LOG))?;
        writeln!(file, "{}", serde_json::to_string(entry)?)?;
        Ok(())
    }

    /// Every entry of the run log, oldest first
    pub fn read_run_log(&self) -> Result<Vec<RunLogEntry>> {
        let path = self.root.join(RUN_LOG);
        if !path.exists() {
            return Ok(Vec::new());
        }
        fs::read_to_string(path)?
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| Ok(serde_json::from_str(line)?))
            .collect()
    }
}

/// The artifacts of one run, loaded and cross-checked
#[derive(Debug, Clone)]
pub struct RunArtifacts {
    pub run_id: String,
    pub schema: Schema,
    pub scaler: MinMaxScaler,
    pub model: ModelArtifact,
    pub metrics: Option<EvaluationMetrics>,
}

impl RunArtifacts {
    /// Rebuild the serve-mode aligner from the schema and scaler
    pub fn aligner(&self) -> Result<ColumnAligner> {
        Ok(ColumnAligner::new(self.schema.clone(), self.scaler.clone())?)
    }
}

/// One line of the run log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunLogEntry {
    pub run_id: String,
    pub finished_at: String,
    pub model_name: String,
    pub params: crate::models::ModelParams,
    pub validation_year: i32,
    pub feature_count: usize,
    pub fit_rows: usize,
    pub validation_rows: usize,
    pub metrics: EvaluationMetrics,
}
