//! Embedding-provider boundary.
//!
//! The engine never computes embeddings itself; it asks an implementation of
//! [`EmbeddingProvider`].  The provider must be deterministic in output
//! dimensionality across calls.  A provider failure is fatal for the current
//! evaluation (see [`crate::EvalError::Embedding`]): an indeterminate
//! semantic check must not be silently treated as "no match".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

/// Errors produced by an embedding provider.
#[derive(Debug, thiserror::Error)]
pub enum EmbeddingError {
    #[error("embedding request failed: {0}")]
    Request(String),

    #[error("embedding response malformed: {0}")]
    Response(String),

    #[error("embedding request timed out after {0:?}")]
    Timeout(Duration),
}

/// Turns text into a fixed-dimension embedding vector.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed `text`.  Dimensionality of the returned vector must be stable
    /// across calls, and identical input text must produce identical output.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError>;
}

#[async_trait]
impl<T: EmbeddingProvider + ?Sized> EmbeddingProvider for Arc<T> {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        (**self).embed(text).await
    }
}
