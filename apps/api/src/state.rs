use std::sync::Arc;

use crate::impact::pipeline::ImpactPipeline;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Request pipeline. Holds the read-only model and clients built at startup.
    pub pipeline: Arc<ImpactPipeline>,
}
