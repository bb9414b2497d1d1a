//! # sales_server
//!
//! HTTP prediction service for the sales forecasting model.
//!
//! The service loads the current run's schema, scaler and model once at
//! startup into an immutable [`InferenceContext`] shared by every request.
//! When loading fails the service still starts, answers its health probes
//! and rejects predictions with 503.

use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use feature_align::{ColumnAligner, FeatureBuilder, RecordInput};
use sales_forecast::{ArtifactStore, ForecastError, TrainedRegressor};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{debug, info};

pub mod config;
pub mod error;
pub mod routes;

pub use config::ServerConfig;
pub use error::ApiError;

/// Everything needed to answer a prediction, loaded once
#[derive(Debug)]
pub struct InferenceContext {
    builder: FeatureBuilder,
    aligner: ColumnAligner,
    model: Arc<dyn TrainedRegressor>,
    run_id: Option<String>,
}

impl InferenceContext {
    /// Pair an aligner with a model fitted on the same column layout
    pub fn new(
        aligner: ColumnAligner,
        model: Arc<dyn TrainedRegressor>,
    ) -> Result<Self, ForecastError> {
        if model.feature_names() != aligner.schema().expected_columns() {
            return Err(feature_align::AlignError::SchemaMismatch(format!(
                "model expects {} columns, schema lists {}",
                model.feature_names().len(),
                aligner.schema().len()
            ))
            .into());
        }

        Ok(Self {
            builder: FeatureBuilder::new(),
            aligner,
            model,
            run_id: None,
        })
    }

    /// Load the artifacts the store's `current` pointer names
    pub fn from_store(store: &ArtifactStore) -> Result<Self, ForecastError> {
        let artifacts = store.load_current()?;
        let aligner = artifacts.aligner()?;
        let mut context = Self::new(aligner, artifacts.model.into_shared())?;
        context.run_id = Some(artifacts.run_id);
        Ok(context)
    }

    pub fn run_id(&self) -> Option<&str> {
        self.run_id.as_deref()
    }

    pub fn model_name(&self) -> &str {
        self.model.name()
    }

    /// Validate, build, align and score one request
    pub fn predict(&self, input: RecordInput) -> Result<f64, ForecastError> {
        let record = input.into_record()?;
        let row = self.builder.build_one(&record)?;
        let aligned = self.aligner.align(row)?;
        let predictions = self.model.predict(&aligned)?;
        debug!(store = record.store_nbr, family = %record.family, "scored request");

        predictions.first().copied().ok_or_else(|| {
            ForecastError::ModelError("model returned no prediction for one row".to_string())
        })
    }
}

/// Application state shared across handlers
#[derive(Debug, Clone, Default)]
pub struct AppState {
    context: Option<Arc<InferenceContext>>,
}

impl AppState {
    pub fn ready(context: InferenceContext) -> Self {
        Self {
            context: Some(Arc::new(context)),
        }
    }

    /// State of a service whose artifacts could not be loaded
    pub fn degraded() -> Self {
        Self { context: None }
    }

    pub fn context(&self) -> Option<&Arc<InferenceContext>> {
        self.context.as_ref()
    }

    /// Load from the store, falling back to degraded mode
    pub fn load(store: &ArtifactStore) -> Self {
        match InferenceContext::from_store(store) {
            Ok(context) => {
                info!(
                    run_id = context.run_id().unwrap_or("unknown"),
                    model = context.model_name(),
                    "loaded model artifacts"
                );
                Self::ready(context)
            }
            Err(e) => {
                tracing::error!(
                    error = %e,
                    artifacts = %store.root().display(),
                    "failed to load artifacts, starting degraded"
                );
                Self::degraded()
            }
        }
    }
}

/// CORS layer for the configured origins
pub fn cors_layer(origins: &[String]) -> CorsLayer {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);
    if origins.iter().any(|o| o == "*") {
        return layer.allow_origin(Any);
    }

    let parsed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();
    layer.allow_origin(parsed)
}

/// Build the router with middleware
pub fn app(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/", get(routes::index))
        .route("/health/live", get(routes::liveness))
        .route("/health/ready", get(routes::readiness))
        .route("/predict", post(routes::predict))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}
