//! Axum route handlers for the Impact API.

use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::state::AppState;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub url: String,
}

#[derive(Debug, Serialize)]
pub struct PredictResponse {
    pub predicted_impact_score: f64,
    pub description: String,
    pub total_goal: u64,
    pub remaining_funds: u64,
    pub donors: u64,
}

// ────────────────────────────────────────────────────────────────────────────
// Handlers
// ────────────────────────────────────────────────────────────────────────────

/// POST /predict
///
/// Scrapes the page, asks the LLM about its fundraising figures, and scores
/// the result with the impact model. Any failure is a 500 with `detail`.
pub async fn handle_predict(
    State(state): State<AppState>,
    Json(request): Json<PredictRequest>,
) -> Result<Json<PredictResponse>, AppError> {
    let assessment = state.pipeline.run(&request.url).await?;

    Ok(Json(PredictResponse {
        predicted_impact_score: round_to_cents(assessment.score),
        description: assessment.description,
        total_goal: assessment.figures.goal,
        remaining_funds: assessment.figures.remaining,
        donors: assessment.figures.donors,
    }))
}

fn round_to_cents(score: f64) -> f64 {
    (score * 100.0).round() / 100.0
}

// ────────────────────────────────────────────────────────────────────────────
// Tests
// ────────────────────────────────────────────────────────────────────────────
