//! API route handlers

use crate::error::ApiError;
use crate::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use feature_align::RecordInput;
use serde::Serialize;
use serde_json::{json, Value};

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub status: &'static str,
    pub predicted_sales: f64,
    pub message: String,
}

/// Service information
pub async fn index(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "sales_server",
        "version": env!("CARGO_PKG_VERSION"),
        "model_loaded": state.context().is_some(),
        "endpoints": ["POST /predict", "GET /health/live", "GET /health/ready"],
    }))
}

/// Liveness probe - is the server running?
pub async fn liveness() -> Json<Value> {
    Json(json!({
        "status": "alive",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// Readiness probe - are the model artifacts loaded?
pub async fn readiness(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    match state.context() {
        Some(context) => (
            StatusCode::OK,
            Json(json!({
                "status": "ready",
                "run_id": context.run_id(),
                "model": context.model_name(),
            })),
        ),
        None => (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(json!({
                "status": "degraded",
                "message": "model artifacts are not loaded",
            })),
        ),
    }
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<RecordInput>, JsonRejection>,
) -> Result<Json<PredictResponse>, ApiError> {
    let context = state.context().ok_or_else(|| {
        ApiError::ServiceUnavailable("Service Unavailable: Model not loaded".to_string())
    })?;
    let Json(input) = payload?;

    let predicted_sales = context.predict(input)?;
    Ok(Json(PredictResponse {
        status: "success",
        predicted_sales,
        message: "Prediction successful".to_string(),
    }))
}
