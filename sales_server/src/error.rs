//! API errors and their HTTP mapping

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use feature_align::AlignError;
use sales_forecast::ForecastError;
use serde::Serialize;
use thiserror::Error;
use tracing::{error, warn};

/// Errors returned by the prediction endpoints
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    MalformedInput(String),

    #[error("{0}")]
    ServiceUnavailable(String),

    #[error("{0}")]
    SchemaMismatch(String),

    #[error("{0}")]
    Internal(String),
}

/// Body of every error response
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: &'static str,
    pub kind: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::MalformedInput(_) => "malformed_input",
            ApiError::ServiceUnavailable(_) => "service_unavailable",
            ApiError::SchemaMismatch(_) => "schema_mismatch",
            ApiError::Internal(_) => "internal",
        }
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::SchemaMismatch(_) | ApiError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ForecastError> for ApiError {
    fn from(err: ForecastError) -> Self {
        match err.as_align_error() {
            Some(AlignError::MalformedInput(message)) => ApiError::MalformedInput(message.clone()),
            Some(AlignError::SchemaMismatch(message)) => ApiError::SchemaMismatch(message.clone()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<AlignError> for ApiError {
    fn from(err: AlignError) -> Self {
        ForecastError::from(err).into()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::MalformedInput(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
        } else {
            warn!(kind = self.kind(), error = %self, "request rejected");
        }

        let body = ErrorBody {
            status: "error",
            kind: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}
