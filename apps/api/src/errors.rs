use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::extraction::ExtractionError;
use crate::prediction::PredictionError;

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
///
/// Every variant surfaces to the client the same way: HTTP 500 with the
/// underlying message in `detail`. The variant only shows up in the logs.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Fetch(String),

    #[error("{0}")]
    Embedding(String),

    #[error("{0}")]
    Synthesis(String),

    #[error(transparent)]
    Extraction(#[from] ExtractionError),

    #[error(transparent)]
    Prediction(#[from] PredictionError),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    fn kind(&self) -> &'static str {
        match self {
            AppError::Fetch(_) => "FETCH_ERROR",
            AppError::Embedding(_) => "EMBEDDING_ERROR",
            AppError::Synthesis(_) => "SYNTHESIS_ERROR",
            AppError::Extraction(_) => "EXTRACTION_ERROR",
            AppError::Prediction(_) => "PREDICTION_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let detail = self.to_string();
        tracing::error!(kind = self.kind(), "Request failed: {detail}");

        let body = Json(json!({ "detail": detail }));
        (StatusCode::INTERNAL_SERVER_ERROR, body).into_response()
    }
}
