//! Deterministic offline embedding provider.
//!
//! Expands a SHA-256 digest of the input text into a unit-length vector of
//! the configured dimensionality.  Identical text always yields an identical
//! vector and distinct texts are effectively orthogonal in expectation, so
//! keyword-free plumbing (CLI runs, integration tests) works without a
//! network dependency.  The vectors carry no semantic meaning.

use async_trait::async_trait;
use sha2::{Digest, Sha256};

use policy_core::{EmbeddingError, EmbeddingProvider};

/// Default dimensionality, matching common hosted embedding models.
pub const DEFAULT_DIMENSIONS: usize = 1536;

/// Digest-derived [`EmbeddingProvider`] with a fixed output dimension.
#[derive(Debug, Clone)]
pub struct HashedEmbeddingProvider {
    dimensions: usize,
}

impl HashedEmbeddingProvider {
    pub fn new(dimensions: usize) -> Self {
        Self { dimensions }
    }
}

impl Default for HashedEmbeddingProvider {
    fn default() -> Self {
        Self::new(DEFAULT_DIMENSIONS)
    }
}

#[async_trait]
impl EmbeddingProvider for HashedEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if self.dimensions == 0 {
            return Err(EmbeddingError::Response(
                "hashed provider configured with zero dimensions".into(),
            ));
        }

        let mut values = Vec::with_capacity(self.dimensions);
        let mut block: u64 = 0;
        while values.len() < self.dimensions {
            // One digest block yields eight components; the block counter
            // extends the stream to any dimensionality.
            let mut hasher = Sha256::new();
            hasher.update(text.as_bytes());
            hasher.update(block.to_le_bytes());
            let digest = hasher.finalize();

            for chunk in digest.chunks_exact(4) {
                if values.len() == self.dimensions {
                    break;
                }
                let raw = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
                // Map to [-1, 1].
                values.push((f64::from(raw) / f64::from(u32::MAX) * 2.0 - 1.0) as f32);
            }
            block += 1;
        }

        // Normalise to unit length so cosine scores stay well-conditioned.
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in &mut values {
                *v /= norm;
            }
        }

        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn identical_text_yields_identical_vectors() {
        let provider = HashedEmbeddingProvider::new(64);
        let a = provider.embed("reset password").await.unwrap();
        let b = provider.embed("reset password").await.unwrap();
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn distinct_texts_yield_distinct_vectors() {
        let provider = HashedEmbeddingProvider::new(64);
        let a = provider.embed("reset password").await.unwrap();
        let b = provider.embed("weather today").await.unwrap();
        assert_ne!(a, b);
    }

    #[tokio::test]
    async fn dimensionality_is_stable_and_configurable() {
        let provider = HashedEmbeddingProvider::new(100);
        let a = provider.embed("alpha").await.unwrap();
        let b = provider.embed("a much longer piece of text than alpha").await.unwrap();
        assert_eq!(a.len(), 100);
        assert_eq!(b.len(), 100);
    }

    #[tokio::test]
    async fn vectors_are_unit_length() {
        let provider = HashedEmbeddingProvider::new(256);
        let v = provider.embed("anything").await.unwrap();
        let norm: f32 = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-3);
    }

    #[tokio::test]
    async fn zero_dimensions_is_rejected() {
        let provider = HashedEmbeddingProvider::new(0);
        assert!(provider.embed("x").await.is_err());
    }
}
