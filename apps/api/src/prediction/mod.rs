// Impact prediction: a pre-trained regression model scores one feature row
// per request. The model is loaded once at startup and only read afterwards.

pub mod model;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PredictionError {
    #[error("invalid impact model: {0}")]
    InvalidModel(String),

    #[error("impact model inference failed: {0}")]
    Inference(String),

    #[error("impact model produced a non-finite score")]
    NonFinite,
}

/// One row of model input, named after the training columns.
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionRow {
    pub description: String,
    pub total_goal: u64,
    pub remaining_funds: u64,
    pub donors: u64,
}

/// Scores a feature row. Carried by the pipeline as `Arc<dyn ImpactPredictor>`.
pub trait ImpactPredictor: Send + Sync {
    fn predict(&self, row: &PredictionRow) -> Result<f64, PredictionError>;
}
