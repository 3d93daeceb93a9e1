//! Embedding model boundary.
//!
//! The embedding model is an external, network-backed collaborator treated
//! as a pure function from text to a fixed-length vector (deterministic for
//! caching purposes). [`EmbeddingProvider`] is the seam: implementations can
//! be swapped without touching the indexer or retriever.
//!
//! Failures split into transient (retried here with exponential backoff)
//! and permanent (surfaced immediately).

mod openai;

pub use openai::OpenAiEmbedder;

use crate::error::EmbeddingError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::warn;

/// Boundary trait for embedding models.
///
/// Implementations must be `Send + Sync`; the ingestion pipeline shares one
/// provider across concurrently embedded documents.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embeds a batch of texts, returning one vector per input in the same
    /// order. Every vector has length [`dimension`](Self::dimension).
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError>;

    /// Embeds a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        let texts = [text.to_string()];
        let mut vectors = self.embed_batch(&texts).await?;
        vectors.pop().ok_or_else(|| {
            EmbeddingError::Permanent("provider returned no vector for input".to_string())
        })
    }

    /// Fixed output dimension of this model.
    fn dimension(&self) -> usize;

    /// Stable model identifier, recorded in the index snapshot. A change of
    /// model id invalidates the index and forces a rebuild.
    fn model_id(&self) -> &str;
}

/// Embeds a batch, retrying transient failures with exponential backoff.
///
/// Waits `base_delay`, `2 * base_delay`, `4 * base_delay`, ... between
/// attempts. Permanent failures are returned immediately; after
/// `max_retries` transient failures the last error is returned and the
/// caller downgrades the document to a per-run failure.
pub async fn embed_with_backoff(
    provider: &dyn EmbeddingProvider,
    texts: &[String],
    max_retries: usize,
    base_delay: Duration,
) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut attempt = 0;
    loop {
        match provider.embed_batch(texts).await {
            Ok(vectors) => return Ok(vectors),
            Err(EmbeddingError::Transient(reason)) if attempt < max_retries => {
                let delay = base_delay * 2u32.saturating_pow(attempt as u32);
                warn!(
                    attempt = attempt + 1,
                    max_retries,
                    delay_ms = delay.as_millis() as u64,
                    %reason,
                    "transient embedding failure, backing off"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}
