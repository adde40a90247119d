//! ONNX impact model, run with tract.
//!
//! The graph takes raw vocabulary counts (`term_counts`, float[1, V]) and the
//! three figures (`numeric`, float[1, 3]) and returns `score` (float[1, 1]).
//! TF-IDF weighting, scaling and the regression all live in the graph; this
//! side only tokenizes the description and counts vocabulary terms. The
//! vocabulary ships in the model metadata under `vocabulary`, in input order.

use std::collections::HashMap;
use std::path::Path;

use anyhow::Context;
use regex::Regex;
use tract_onnx::prelude::*;
use tracing::info;

use crate::prediction::{ImpactPredictor, PredictionError, PredictionRow};

/// Two or more word characters, as the training vectorizer tokenized.
const TOKEN_PATTERN: &str = r"\b\w\w+\b";
const VOCABULARY_KEY: &str = "vocabulary";
const NUMERIC_FEATURES: usize = 3;

type ImpactPlan = SimplePlan<TypedFact, Box<dyn TypedOp>, Graph<TypedFact, Box<dyn TypedOp>>>;

pub struct ImpactModel {
    plan: ImpactPlan,
    vocabulary: HashMap<String, usize>,
    tokenizer: Regex,
}

impl ImpactModel {
    /// Parses, optimizes and validates the model. Called once at startup.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let model = Self::from_path(path)
            .with_context(|| format!("Failed to load impact model from {}", path.display()))?;
        info!(
            path = %path.display(),
            vocabulary = model.vocabulary.len(),
            "Impact model loaded"
        );
        Ok(model)
    }

    fn from_path(path: &Path) -> anyhow::Result<Self> {
        let onnx = tract_onnx::onnx();
        let proto = onnx.proto_model_for_path(path)?;

        let terms: Vec<String> = proto
            .metadata_props
            .iter()
            .find(|p| p.key == VOCABULARY_KEY)
            .ok_or_else(|| {
                PredictionError::InvalidModel(format!("missing '{VOCABULARY_KEY}' metadata"))
            })
            .and_then(|p| {
                serde_json::from_str(&p.value)
                    .map_err(|e| PredictionError::InvalidModel(format!("bad vocabulary: {e}")))
            })?;
        if terms.is_empty() {
            return Err(PredictionError::InvalidModel("empty vocabulary".to_string()).into());
        }

        let plan = onnx
            .model_for_proto_model(&proto)?
            .with_input_fact(0, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, terms.len())))?
            .with_input_fact(1, InferenceFact::dt_shape(f32::datum_type(), tvec!(1, NUMERIC_FEATURES)))?
            .into_optimized()?
            .into_runnable()?;

        let vocabulary = terms
            .into_iter()
            .enumerate()
            .map(|(index, term)| (term, index))
            .collect();
        let tokenizer = Regex::new(TOKEN_PATTERN)?;

        Ok(Self {
            plan,
            vocabulary,
            tokenizer,
        })
    }

    /// Raw term counts over the vocabulary, lowercased like the vectorizer.
    fn term_counts(&self, description: &str) -> Vec<f32> {
        let mut counts = vec![0.0f32; self.vocabulary.len()];
        let lowered = description.to_lowercase();
        for token in self.tokenizer.find_iter(&lowered) {
            if let Some(&index) = self.vocabulary.get(token.as_str()) {
                counts[index] += 1.0;
            }
        }
        counts
    }

    fn run(&self, row: &PredictionRow) -> TractResult<f32> {
        let counts = self.term_counts(&row.description);
        let numeric = [
            row.total_goal as f32,
            row.remaining_funds as f32,
            row.donors as f32,
        ];

        let counts = Tensor::from_shape(&[1, counts.len()], &counts)?;
        let numeric = Tensor::from_shape(&[1, NUMERIC_FEATURES], &numeric)?;
        let outputs = self.plan.run(tvec!(counts.into(), numeric.into()))?;

        let score = *outputs[0]
            .to_array_view::<f32>()?
            .iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("impact model returned no output"))?;
        Ok(score)
    }
}

impl ImpactPredictor for ImpactModel {
    fn predict(&self, row: &PredictionRow) -> Result<f64, PredictionError> {
        let score = self
            .run(row)
            .map_err(|e| PredictionError::Inference(e.to_string()))?;

        if score.is_finite() {
            Ok(f64::from(score))
        } else {
            Err(PredictionError::NonFinite)
        }
    }
}
