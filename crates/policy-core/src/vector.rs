//! Narrow vector-similarity capability consumed by the semantic matcher.
//!
//! Any vector-capable backend can sit behind [`VectorIndex`]; the default
//! [`ExactCosine`] implementation computes exact cosine similarity in
//! process, which is what the per-rule contract requires (the semantic
//! matcher compares the prompt against a *specific* rule's embedding, not a
//! top-k neighbourhood).

/// Errors that can occur while computing a similarity score.
#[derive(Debug, thiserror::Error)]
pub enum SimilarityError {
    #[error("embedding dimension mismatch: rule has {rule} dimensions, prompt has {prompt}")]
    DimensionMismatch { rule: usize, prompt: usize },

    #[error("cannot compare a zero-magnitude embedding")]
    ZeroMagnitude,

    #[error("vector backend failure: {0}")]
    Backend(String),
}

/// Per-pair exact similarity between two embeddings.
pub trait VectorIndex: Send + Sync {
    /// Cosine similarity between `rule` and `prompt`, in `[-1, 1]`.
    fn similarity(&self, rule: &[f32], prompt: &[f32]) -> Result<f64, SimilarityError>;
}

/// In-process exact cosine similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactCosine;

impl VectorIndex for ExactCosine {
    fn similarity(&self, rule: &[f32], prompt: &[f32]) -> Result<f64, SimilarityError> {
        if rule.len() != prompt.len() {
            return Err(SimilarityError::DimensionMismatch {
                rule: rule.len(),
                prompt: prompt.len(),
            });
        }

        let mut dot = 0.0f64;
        let mut norm_rule = 0.0f64;
        let mut norm_prompt = 0.0f64;
        for (a, b) in rule.iter().zip(prompt.iter()) {
            let (a, b) = (f64::from(*a), f64::from(*b));
            dot += a * b;
            norm_rule += a * a;
            norm_prompt += b * b;
        }

        let denominator = norm_rule.sqrt() * norm_prompt.sqrt();
        if denominator == 0.0 {
            return Err(SimilarityError::ZeroMagnitude);
        }

        Ok(dot / denominator)
    }
}
