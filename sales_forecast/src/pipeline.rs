//! The training run as a linear sequence of stages
//!
//! A run either completes every stage or stops at the first failing one and
//! reports it. Nothing is retried. Artifacts are only promoted by the
//! `PersistArtifacts` stage, so a run that fails earlier leaves the current
//! artifacts untouched.

use crate::artifacts::{ArtifactStore, RunLogEntry};
use crate::config::TrainingConfig;
use crate::data::{write_records, RawDataMerger, RawTables};
use crate::error::{ForecastError, Result};
use crate::metrics::EvaluationMetrics;
use crate::models::{
    GradientBoosting, LinearRegression, ModelArtifact, ModelParams, Regressor, TrainedRegressor,
};
use chrono::{Datelike, Utc};
use feature_align::{fill_missing, ColumnAligner, FeatureBuilder, FeatureTable, SalesRecord};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{error, info, warn};

/// Stages of a training run, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Stage {
    LoadRaw,
    Merge,
    DeriveFeatures,
    FitAlign,
    TrainModel,
    Evaluate,
    PersistArtifacts,
    LogRun,
}

impl Stage {
    pub const ALL: [Stage; 8] = [
        Stage::LoadRaw,
        Stage::Merge,
        Stage::DeriveFeatures,
        Stage::FitAlign,
        Stage::TrainModel,
        Stage::Evaluate,
        Stage::PersistArtifacts,
        Stage::LogRun,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Stage::LoadRaw => "load_raw",
            Stage::Merge => "merge",
            Stage::DeriveFeatures => "derive_features",
            Stage::FitAlign => "fit_align",
            Stage::TrainModel => "train_model",
            Stage::Evaluate => "evaluate",
            Stage::PersistArtifacts => "persist_artifacts",
            Stage::LogRun => "log_run",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Summary of a completed run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub run_id: String,
    pub run_dir: PathBuf,
    pub model_name: String,
    pub metrics: EvaluationMetrics,
    pub feature_count: usize,
    pub fit_rows: usize,
    pub validation_rows: usize,
    pub scored_rows: usize,
    pub submission_path: PathBuf,
}

/// How a run ended
#[derive(Debug)]
pub enum RunOutcome {
    Completed(RunReport),
    Failed { stage: Stage, cause: ForecastError },
}

impl RunOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, RunOutcome::Completed(_))
    }

    pub fn into_result(self) -> Result<RunReport> {
        match self {
            RunOutcome::Completed(report) => Ok(report),
            RunOutcome::Failed { stage, cause } => Err(ForecastError::StageFailed {
                stage,
                source: Box::new(cause),
            }),
        }
    }
}

type StageResult<T> = std::result::Result<T, (Stage, ForecastError)>;

/// Run `body` as `stage`, logging its start, end and failure
fn stage<T>(stage: Stage, body: impl FnOnce() -> Result<T>) -> StageResult<T> {
    info!(stage = %stage, "stage started");
    let started = Instant::now();
    match body() {
        Ok(value) => {
            info!(
                stage = %stage,
                elapsed_ms = started.elapsed().as_millis() as u64,
                "stage finished"
            );
            Ok(value)
        }
        Err(cause) => {
            error!(stage = %stage, error = %cause, "stage failed");
            Err((stage, cause))
        }
    }
}

struct AlignedTables {
    aligner: ColumnAligner,
    train: FeatureTable,
    score: FeatureTable,
}

struct Evaluation {
    metrics: EvaluationMetrics,
    validation_rows: usize,
    scored_rows: usize,
}

/// Drives a training run from raw tables to promoted artifacts
#[derive(Debug, Clone)]
pub struct TrainingOrchestrator {
    config: TrainingConfig,
}

impl TrainingOrchestrator {
    pub fn new(config: TrainingConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Run with the model family named by the configuration
    pub fn run(&self) -> RunOutcome {
        let outcome = match &self.config.model {
            ModelParams::GradientBoosting(params) => GradientBoosting::new(params.clone())
                .map(|regressor| self.run_with(&regressor)),
            ModelParams::Linear(params) => LinearRegression::new(params.clone())
                .map(|regressor| self.run_with(&regressor)),
        };
        outcome.unwrap_or_else(|cause| RunOutcome::Failed {
            stage: Stage::TrainModel,
            cause,
        })
    }

    /// Run with an explicit regressor
    pub fn run_with<R: Regressor>(&self, regressor: &R) -> RunOutcome {
        match self.execute(regressor) {
            Ok(report) => {
                info!(run_id = %report.run_id, "training run completed");
                RunOutcome::Completed(report)
            }
            Err((stage, cause)) => RunOutcome::Failed { stage, cause },
        }
    }

    fn execute<R: Regressor>(&self, regressor: &R) -> StageResult<RunReport> {
        let config = &self.config;
        config.validate().map_err(|e| (Stage::LoadRaw, e))?;

        let tables = stage(Stage::LoadRaw, || {
            RawTables::load(&config.data_dir, &config.files)
        })?;
        let (train, test) = stage(Stage::Merge, || self.merge(&tables))?;
        drop(tables);
        let (table, n_train) = stage(Stage::DeriveFeatures, || self.derive_features(train, test))?;
        let aligned = stage(Stage::FitAlign, || self.fit_align(&table, n_train))?;
        drop(table);

        let (fit_rows, trained) = stage(Stage::TrainModel, || {
            let fit_table = aligned
                .train
                .select(&self.year_mask(&aligned.train, |year, held_out| year < held_out))?;
            if fit_table.is_empty() {
                return Err(ForecastError::DataError(format!(
                    "no training rows dated before {}",
                    config.validation_year
                )));
            }
            let target = fit_table.target_values()?;
            let trained = regressor.fit(&fit_table.frame, &target)?;
            Ok((fit_table.len(), trained))
        })?;

        let evaluation = stage(Stage::Evaluate, || self.evaluate(&trained, &aligned))?;

        let store = ArtifactStore::new(&config.artifact_dir);
        let run_id = store.new_run_id();
        let artifact: ModelArtifact = trained.clone().into();
        let run_dir = stage(Stage::PersistArtifacts, || {
            store.persist_run(
                &run_id,
                aligned.aligner.schema(),
                aligned.aligner.scaler(),
                &artifact,
                &evaluation.metrics,
            )
        })?;

        let report = RunReport {
            run_id: run_id.clone(),
            run_dir,
            model_name: trained.name().to_string(),
            metrics: evaluation.metrics,
            feature_count: aligned.aligner.schema().len(),
            fit_rows,
            validation_rows: evaluation.validation_rows,
            scored_rows: evaluation.scored_rows,
            submission_path: config.submission_path(),
        };

        stage(Stage::LogRun, || {
            store.append_run_log(&RunLogEntry {
                run_id,
                finished_at: Utc::now().to_rfc3339(),
                model_name: report.model_name.clone(),
                params: config.model.clone(),
                validation_year: config.validation_year,
                feature_count: report.feature_count,
                fit_rows: report.fit_rows,
                validation_rows: report.validation_rows,
                metrics: report.metrics,
            })
        })?;

        Ok(report)
    }

    fn merge(&self, tables: &RawTables) -> Result<(Vec<SalesRecord>, Vec<SalesRecord>)> {
        let merger = RawDataMerger::new(tables);
        let (train, test) = merger.merge_all(tables)?;
        if train.is_empty() {
            return Err(ForecastError::DataError(
                "the training table has no rows".to_string(),
            ));
        }
        if let Some(row) = train.iter().find(|r| r.sales.is_none()) {
            return Err(ForecastError::DataError(format!(
                "training row for store {} on {} has no sales",
                row.store_nbr, row.date
            )));
        }

        let merged_dir = self.config.merged_dir();
        write_records(merged_dir.join("train.csv"), &train)?;
        write_records(merged_dir.join("test.csv"), &test)?;
        Ok((train, test))
    }

    /// Build features over train and scoring rows together so both share
    /// the same indicator columns
    fn derive_features(
        &self,
        train: Vec<SalesRecord>,
        test: Vec<SalesRecord>,
    ) -> Result<(FeatureTable, usize)> {
        let train = fill_missing(train);
        let test = fill_missing(test);
        let n_train = train.len();

        let mut combined = train;
        combined.extend(test);
        let builder = FeatureBuilder::new().with_history(self.config.history.clone());
        let table = builder.build_table(&combined)?;
        info!(
            rows = table.len(),
            columns = table.frame.width(),
            "derived features"
        );
        Ok((table, n_train))
    }

    fn fit_align(&self, table: &FeatureTable, n_train: usize) -> Result<AlignedTables> {
        let train_mask: Vec<bool> = (0..table.len()).map(|i| i < n_train).collect();
        let score_mask: Vec<bool> = train_mask.iter().map(|m| !m).collect();
        let train = table.select(&train_mask)?;
        let score = table.select(&score_mask)?;

        let (aligner, scaled_train) = ColumnAligner::fit(&train.frame)?;
        let scaled_score = aligner.align(score.frame.clone())?;
        let train = train.with_frame(scaled_train)?;
        let score = score.with_frame(scaled_score)?;

        let features_dir = self.config.features_dir();
        train.write_csv(features_dir.join("train_final.csv"))?;
        score.write_csv(features_dir.join("test_final.csv"))?;

        Ok(AlignedTables {
            aligner,
            train,
            score,
        })
    }

    fn year_mask(&self, table: &FeatureTable, keep: impl Fn(i32, i32) -> bool) -> Vec<bool> {
        table
            .dates
            .iter()
            .map(|d| keep(d.year(), self.config.validation_year))
            .collect()
    }

    fn evaluate<T: TrainedRegressor>(
        &self,
        trained: &T,
        aligned: &AlignedTables,
    ) -> Result<Evaluation> {
        let validation = aligned
            .train
            .select(&self.year_mask(&aligned.train, |year, held_out| year >= held_out))?;
        if validation.is_empty() {
            return Err(ForecastError::DataError(format!(
                "no training rows dated {} or later to evaluate on",
                self.config.validation_year
            )));
        }

        let actual = validation.target_values()?;
        let predicted = trained.predict(&validation.frame)?;
        let metrics = EvaluationMetrics::evaluate(&actual, &predicted)?;
        info!(
            rmse = metrics.rmse,
            mae = metrics.mae,
            rmsle = metrics.rmsle,
            rows = validation.len(),
            "validation metrics"
        );

        let scored_rows = if aligned.score.is_empty() {
            warn!("no scoring rows, writing an empty submission");
            write_submission(self.config.submission_path(), &[], &[])?;
            0
        } else {
            let predictions = trained.predict(&aligned.score.frame)?;
            write_submission(self.config.submission_path(), &aligned.score.ids, &predictions)?;
            predictions.len()
        };

        Ok(Evaluation {
            metrics,
            validation_rows: validation.len(),
            scored_rows,
        })
    }
}

/// Write `id,sales` rows, clipping negative predictions to zero
pub fn write_submission<P: AsRef<Path>>(
    path: P,
    ids: &[Option<i64>],
    predictions: &[f64],
) -> Result<()> {
    if ids.len() != predictions.len() {
        return Err(ForecastError::DataError(format!(
            "{} ids for {} predictions",
            ids.len(),
            predictions.len()
        )));
    }
    let path = path.as_ref();
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }

    let sales: Vec<f64> = predictions.iter().map(|p| p.max(0.0)).collect();
    let mut df = DataFrame::new(vec![
        Series::new("id", ids.to_vec()),
        Series::new("sales", sales),
    ])?;
    let mut file = File::create(path)?;
    CsvWriter::new(&mut file).has_header(true).finish(&mut df)?;
    info!(rows = predictions.len(), path = %path.display(), "wrote submission");
    Ok(())
}
