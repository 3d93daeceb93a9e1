//! Deterministic embedding mock shared by unit tests.

use crate::error::EmbeddingError;
use crate::embedding::EmbeddingProvider;
use async_trait::async_trait;
use sha2::{Digest, Sha256};

/// Projects text into a deterministic unit vector.
///
/// Each lowercased whitespace token contributes its SHA-256 digest bytes to
/// the accumulator, so identical texts always embed identically and token
/// overlap correlates the vectors. No trained model is involved.
pub(crate) fn hash_embed(text: &str, dimension: usize) -> Vec<f32> {
    let mut acc = vec![0.0f32; dimension];
    for token in text.to_lowercase().split_whitespace() {
        let digest = Sha256::digest(token.as_bytes());
        for (j, slot) in acc.iter_mut().enumerate() {
            *slot += (digest[j % 32] as f32 / 127.5) - 1.0;
        }
    }
    let norm = acc.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        for v in &mut acc {
            *v /= norm;
        }
    }
    acc
}

/// In-process embedding provider backed by [`hash_embed`].
pub(crate) struct HashEmbedder {
    dimension: usize,
    model_id: String,
}

impl HashEmbedder {
    pub(crate) fn new(dimension: usize) -> Self {
        Self::with_model_id(dimension, "hash-embedder-v1")
    }

    pub(crate) fn with_model_id(dimension: usize, model_id: &str) -> Self {
        Self {
            dimension,
            model_id: model_id.to_string(),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HashEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        Ok(texts.iter().map(|t| hash_embed(t, self.dimension)).collect())
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_embed_is_deterministic_and_normalized() {
        let a = hash_embed("solar capacity growth", 8);
        let b = hash_embed("solar capacity growth", 8);
        assert_eq!(a, b);
        let norm = a.iter().map(|v| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn distinct_texts_embed_differently() {
        let a = hash_embed("solar power", 8);
        let b = hash_embed("wind power", 8);
        assert_ne!(a, b);
    }
}
