//! Embeddings client for OpenAI-compatible endpoints.

use super::EmbeddingProvider;
use crate::error::EmbeddingError;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default request timeout for embedding calls.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Embeddings client that talks to an OpenAI-compatible `/embeddings`
/// endpoint.
///
/// Rate limits (429), server errors (5xx), and transport failures map to
/// [`EmbeddingError::Transient`]; other HTTP errors and malformed responses
/// are [`EmbeddingError::Permanent`]. Retry policy lives in the caller (see
/// [`super::embed_with_backoff`]).
#[derive(Clone)]
pub struct OpenAiEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    dimension: usize,
}

impl OpenAiEmbedder {
    /// Builds a client for the given endpoint and model.
    ///
    /// `dimension` is the fixed output dimension of `model`; every response
    /// vector is validated against it.
    pub fn new(
        api_key: &str,
        base_url: &str,
        model: &str,
        dimension: usize,
    ) -> Result<Self, EmbeddingError> {
        if api_key.trim().is_empty() {
            return Err(EmbeddingError::Permanent("missing API key".to_string()));
        }
        if model.trim().is_empty() {
            return Err(EmbeddingError::Permanent("missing model name".to_string()));
        }

        let mut headers = HeaderMap::new();
        let auth = format!("Bearer {}", api_key.trim());
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&auth)
                .map_err(|_| EmbeddingError::Permanent("invalid API key".to_string()))?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .default_headers(headers)
            .build()
            .map_err(|e| EmbeddingError::Permanent(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", base_url.trim_end_matches('/')),
            model: model.to_string(),
            dimension,
        })
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingEntry>,
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    index: usize,
    embedding: Vec<f32>,
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let request = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };
        let response = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .map_err(|e| EmbeddingError::Transient(format!("request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let reason = format!("HTTP {status}: {body}");
            return if status.as_u16() == 429 || status.is_server_error() {
                Err(EmbeddingError::Transient(reason))
            } else {
                Err(EmbeddingError::Permanent(reason))
            };
        }

        let mut parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Permanent(format!("malformed response: {e}")))?;

        // The API does not guarantee response order.
        parsed.data.sort_by_key(|entry| entry.index);
        if parsed.data.len() != texts.len() {
            return Err(EmbeddingError::Permanent(format!(
                "{} embeddings returned for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        let mut vectors = Vec::with_capacity(parsed.data.len());
        for entry in parsed.data {
            if entry.embedding.len() != self.dimension {
                return Err(EmbeddingError::DimensionMismatch {
                    expected: self.dimension,
                    actual: entry.embedding.len(),
                });
            }
            vectors.push(entry.embedding);
        }
        Ok(vectors)
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
