//! Retrieval QA: embed chunks, retrieve the best matches for a question,
//! and ask the completion model to answer from them.

use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::AppError;
use crate::ingest::Chunk;
use crate::llm_client::{Embedder, LanguageModel};
use crate::retrieval::index::VectorIndex;
use crate::retrieval::prompts::build_qa_prompt;

/// Texts per embeddings request.
const EMBED_BATCH_SIZE: usize = 100;

pub struct RetrievalQa {
    embedder: Arc<dyn Embedder>,
    llm: Arc<dyn LanguageModel>,
    top_k: usize,
}

impl RetrievalQa {
    pub fn new(embedder: Arc<dyn Embedder>, llm: Arc<dyn LanguageModel>, top_k: usize) -> Self {
        Self {
            embedder,
            llm,
            top_k: top_k.max(1),
        }
    }

    /// Answers `question` from `chunks`. Returns the trimmed model answer.
    pub async fn answer(&self, chunks: Vec<Chunk>, question: &str) -> Result<String, AppError> {
        let vectors = self.embed_chunks(&chunks).await?;
        let index = VectorIndex::from_embeddings(chunks, vectors)?;

        let query_vector = self
            .embedder
            .embed(&[question.to_string()])
            .await
            .map_err(|e| AppError::Embedding(e.to_string()))?
            .into_iter()
            .next()
            .ok_or_else(|| AppError::Embedding("Empty embedding response".to_string()))?;

        let hits = index.search(&query_vector, self.top_k);
        if let Some(best) = hits.first() {
            debug!(
                retrieved = hits.len(),
                best_chunk = best.chunk.index,
                best_score = best.score,
                source = %best.chunk.source,
                "Retrieved context chunks"
            );
        }

        let context = hits
            .iter()
            .map(|h| h.chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n");
        let prompt = build_qa_prompt(&context, question);

        let answer = self
            .llm
            .complete(&prompt)
            .await
            .map_err(|e| AppError::Synthesis(e.to_string()))?;
        let answer = answer.trim();
        if answer.is_empty() {
            return Err(AppError::Synthesis("LLM returned empty content".to_string()));
        }

        info!(answer_chars = answer.len(), "Answer synthesized");
        Ok(answer.to_string())
    }

    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<Vec<f32>>, AppError> {
        let mut vectors = Vec::with_capacity(chunks.len());
        for batch in chunks.chunks(EMBED_BATCH_SIZE) {
            let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
            let embedded = self
                .embedder
                .embed(&texts)
                .await
                .map_err(|e| AppError::Embedding(e.to_string()))?;
            vectors.extend(embedded);
        }
        debug!(chunks = chunks.len(), "Chunks embedded");
        Ok(vectors)
    }
}
