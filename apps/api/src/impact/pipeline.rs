//! Impact pipeline: fetch → split → embed/index → retrieve + synthesize →
//! extract numbers → predict. Strictly sequential; the first failing step
//! ends the request.

use std::sync::Arc;

use tracing::info;

use crate::errors::AppError;
use crate::extraction::ner::EntityRecognizer;
use crate::extraction::{extract_numbers, ExtractionResult};
use crate::ingest::loader::DocumentLoader;
use crate::ingest::splitter::TextSplitter;
use crate::prediction::{ImpactPredictor, PredictionRow};
use crate::retrieval::prompts::IMPACT_QUERY;
use crate::retrieval::qa::RetrievalQa;

/// Unrounded pipeline output for one URL.
#[derive(Debug, Clone)]
pub struct ImpactAssessment {
    pub score: f64,
    pub description: String,
    pub figures: ExtractionResult,
}

pub struct ImpactPipeline {
    loader: Arc<dyn DocumentLoader>,
    splitter: TextSplitter,
    qa: RetrievalQa,
    recognizer: Arc<dyn EntityRecognizer>,
    predictor: Arc<dyn ImpactPredictor>,
}

impl ImpactPipeline {
    pub fn new(
        loader: Arc<dyn DocumentLoader>,
        splitter: TextSplitter,
        qa: RetrievalQa,
        recognizer: Arc<dyn EntityRecognizer>,
        predictor: Arc<dyn ImpactPredictor>,
    ) -> Self {
        Self {
            loader,
            splitter,
            qa,
            recognizer,
            predictor,
        }
    }

    pub async fn run(&self, url: &str) -> Result<ImpactAssessment, AppError> {
        let documents = self.loader.load(url).await?;

        let chunks = self.splitter.split_documents(&documents);
        info!(url = %url, chunks = chunks.len(), "Document split");

        let description = self.qa.answer(chunks, IMPACT_QUERY).await?;

        let figures = extract_numbers(&description, self.recognizer.as_ref())?;
        info!(
            goal = figures.goal,
            remaining = figures.remaining,
            donors = figures.donors,
            "Fundraising figures extracted"
        );

        let row = PredictionRow {
            description,
            total_goal: figures.goal,
            remaining_funds: figures.remaining,
            donors: figures.donors,
        };
        let score = self.predictor.predict(&row)?;
        info!(url = %url, score, "Impact predicted");

        Ok(ImpactAssessment {
            score,
            description: row.description,
            figures,
        })
    }
}
