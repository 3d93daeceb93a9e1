//! The update pipeline: filter, chunk, embed, merge.

use super::{FetchedDocument, IngestPhase, IngestSummary};
use crate::chunking::{Chunk, Chunker};
use crate::config::IngestConfig;
use crate::embedding::{embed_with_backoff, EmbeddingProvider};
use crate::error::IngestError;
use crate::storage::{
    load_state, DocumentId, DocumentRecord, DocumentStore, IndexSnapshot, StorageLayout,
};
use futures_util::stream::{self, StreamExt};
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

/// Single designated writer for the persisted state.
///
/// Owns the manifest and snapshot between runs. Readers (the retriever)
/// load their own immutable copy via [`load_state`] and keep using it until
/// they explicitly reload; ingestion and querying are not expected to run
/// concurrently within one process.
///
/// Cancellation is cooperative: dropping a run mid-flight discards its
/// partial results without touching the persisted snapshot, because nothing
/// is written before the merging phase and every write is atomic.
pub struct UpdatePipeline {
    layout: StorageLayout,
    store: DocumentStore,
    snapshot: IndexSnapshot,
    embedder: Arc<dyn EmbeddingProvider>,
    config: IngestConfig,
}

impl UpdatePipeline {
    /// Opens the pipeline over the storage directory, loading any persisted
    /// state. A fresh directory starts with an empty manifest and an empty
    /// snapshot bound to the provider's model.
    pub fn open(
        layout: StorageLayout,
        embedder: Arc<dyn EmbeddingProvider>,
        config: IngestConfig,
    ) -> Result<Self, crate::error::LoadError> {
        let state = load_state(&layout)?;
        let snapshot = state
            .snapshot
            .unwrap_or_else(|| IndexSnapshot::new(embedder.model_id(), embedder.dimension()));
        Ok(Self {
            layout,
            store: state.store,
            snapshot,
            embedder,
            config,
        })
    }

    /// The current snapshot (reflects merges from completed runs).
    pub fn snapshot(&self) -> &IndexSnapshot {
        &self.snapshot
    }

    /// The document store.
    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    /// Runs one ingestion pass over a scraped batch.
    ///
    /// Already-known identifiers are skipped (re-ingestion is a no-op, so a
    /// run over a fully known batch leaves the snapshot byte-for-byte
    /// unchanged). Documents that fail chunking, or embedding after bounded
    /// retries, are recorded as failed in the manifest and do not abort the
    /// run.
    ///
    /// # Errors
    ///
    /// [`IngestError::ModelChanged`] if the provider's model differs from
    /// the one the snapshot was built with; call
    /// [`rebuild`](Self::rebuild) instead. Persistence failures during
    /// merging abort the run.
    #[instrument(skip_all, fields(batch = batch.len()))]
    pub async fn run(&mut self, batch: Vec<FetchedDocument>) -> Result<IngestSummary, IngestError> {
        if self.snapshot.model_id() != self.embedder.model_id() {
            return Err(IngestError::ModelChanged {
                index_model: self.snapshot.model_id().to_string(),
                provider_model: self.embedder.model_id().to_string(),
            });
        }
        let chunker = Chunker::new(&self.config.chunker)?;
        let mut summary = IngestSummary::default();

        info!(phase = ?IngestPhase::Filtering, batch = batch.len(), "ingestion run started");
        let mut seen: HashSet<DocumentId> = HashSet::new();
        let mut novel = Vec::new();
        for doc in batch {
            let id = DocumentId::derive(&doc.title, &doc.url);
            if self.store.is_known(&id) || !seen.insert(id.clone()) {
                debug!(document = %id, title = %doc.title, "skipping known document");
                summary.skipped.push(id);
            } else {
                novel.push((id, doc));
            }
        }

        info!(phase = ?IngestPhase::Chunking, documents = novel.len());
        let mut failed: Vec<(usize, DocumentId, FetchedDocument, String)> = Vec::new();
        let mut to_embed = Vec::new();
        for (position, (id, doc)) in novel.into_iter().enumerate() {
            match chunker.split(&id, &doc.pages) {
                Ok(chunks) => to_embed.push((position, id, doc, chunks)),
                Err(err) => {
                    warn!(document = %id, title = %doc.title, %err, "chunking failed");
                    failed.push((position, id, doc, err.to_string()));
                }
            }
        }

        info!(phase = ?IngestPhase::Embedding, documents = to_embed.len());
        let dimension = self.snapshot.dimension();
        let config = self.config.clone();
        let results: Vec<_> = stream::iter(to_embed.into_iter().map(|(position, id, doc, chunks)| {
            let embedder = Arc::clone(&self.embedder);
            let config = config.clone();
            async move {
                match embed_document(embedder.as_ref(), &chunks, &config, dimension).await {
                    Ok(vectors) => Ok((position, id, doc, chunks, vectors)),
                    Err(reason) => Err((position, id, doc, reason)),
                }
            }
        }))
        .buffer_unordered(self.config.parallelism.max(1))
        .collect()
        .await;

        let mut merged = Vec::new();
        for result in results {
            match result {
                Ok(entry) => merged.push(entry),
                Err((position, id, doc, reason)) => {
                    warn!(document = %id, title = %doc.title, %reason, "embedding failed");
                    failed.push((position, id, doc, reason));
                }
            }
        }
        // Completion order is nondeterministic under buffer_unordered;
        // merge in batch order so repeated runs produce identical snapshots.
        merged.sort_by_key(|entry| entry.0);
        failed.sort_by_key(|entry| entry.0);

        info!(
            phase = ?IngestPhase::Merging,
            succeeded = merged.len(),
            failed = failed.len()
        );
        for (_, id, doc, reason) in failed {
            self.store.register(
                DocumentRecord::failed(id.clone(), &doc.title, &doc.url, doc.local_path, reason.clone()),
                false,
            )?;
            summary.failed.push((id, reason));
        }
        if !merged.is_empty() {
            let mut registered = Vec::with_capacity(merged.len());
            for (_, id, doc, chunks, vectors) in merged {
                self.snapshot.append(chunks, vectors)?;
                registered.push((id, doc));
            }
            // Snapshot first: a crash between this save and the manifest
            // registrations below surfaces as a detectable inconsistency at
            // the next load, never as a silently half-merged index.
            self.snapshot.save(&self.layout)?;
            for (id, doc) in registered {
                self.store.register(
                    DocumentRecord::indexed(id.clone(), &doc.title, &doc.url, doc.local_path),
                    false,
                )?;
                summary.ingested.push(id);
            }
        }

        info!(
            ingested = summary.ingested.len(),
            skipped = summary.skipped.len(),
            failed = summary.failed.len(),
            "ingestion run finished"
        );
        Ok(summary)
    }

    /// Discards all persisted state and re-ingests the batch from scratch.
    ///
    /// Required after an embedding model change (vectors from different
    /// models are not comparable) and after load-time corruption.
    #[instrument(skip_all, fields(batch = batch.len()))]
    pub async fn rebuild(
        &mut self,
        batch: Vec<FetchedDocument>,
    ) -> Result<IngestSummary, IngestError> {
        info!(
            model = self.embedder.model_id(),
            "forced rebuild: clearing manifest and snapshot"
        );
        self.store.clear()?;
        self.snapshot = IndexSnapshot::new(self.embedder.model_id(), self.embedder.dimension());
        self.snapshot.save(&self.layout)?;
        self.run(batch).await
    }
}

/// Embeds a document's chunks in bounded batches, validating dimensions.
///
/// Transient failures are retried with exponential backoff; an exhausted
/// retry budget or a permanent failure downgrades to a per-document failure
/// reason (the run continues with other documents).
async fn embed_document(
    embedder: &dyn EmbeddingProvider,
    chunks: &[Chunk],
    config: &IngestConfig,
    dimension: usize,
) -> Result<Vec<Vec<f32>>, String> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let mut vectors = Vec::with_capacity(texts.len());
    for batch in texts.chunks(config.embed_batch_size.max(1)) {
        let embedded = embed_with_backoff(
            embedder,
            batch,
            config.embed_max_retries,
            Duration::from_millis(config.embed_backoff_ms),
        )
        .await
        .map_err(|e| e.to_string())?;
        vectors.extend(embedded);
    }
    if vectors.len() != texts.len() {
        return Err(format!(
            "provider returned {} vectors for {} chunks",
            vectors.len(),
            texts.len()
        ));
    }
    for vector in &vectors {
        if vector.len() != dimension {
            return Err(format!(
                "embedding dimension mismatch: expected {dimension}, got {}",
                vector.len()
            ));
        }
    }
    Ok(vectors)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EmbeddingError;
    use crate::storage::IngestStatus;
    use crate::test_utils::HashEmbedder;
    use async_trait::async_trait;
    use tempfile::TempDir;

    fn fetched(title: &str, url: &str, pages: &[&str]) -> FetchedDocument {
        FetchedDocument {
            title: title.to_string(),
            url: url.to_string(),
            local_path: None,
            pages: pages.iter().map(|p| p.to_string()).collect(),
        }
    }

    fn small_config() -> IngestConfig {
        IngestConfig {
            chunker: crate::config::ChunkerConfig {
                target_chars: 40,
                overlap_chars: 8,
            },
            parallelism: 2,
            embed_batch_size: 4,
            embed_max_retries: 1,
            embed_backoff_ms: 1,
        }
    }

    fn sample_batch() -> Vec<FetchedDocument> {
        vec![
            fetched(
                "Solar Outlook",
                "https://example.org/solar",
                &["solar capacity grew strongly this year", "solar costs keep falling"],
            ),
            fetched(
                "Wind Outlook",
                "https://example.org/wind",
                &["offshore wind auctions expanded in europe"],
            ),
        ]
    }

    #[tokio::test]
    async fn run_ingests_novel_documents_and_persists_state() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let embedder = Arc::new(HashEmbedder::new(8));
        let mut pipeline = UpdatePipeline::open(layout.clone(), embedder, small_config()).unwrap();

        let summary = pipeline.run(sample_batch()).await.unwrap();
        assert_eq!(summary.ingested.len(), 2);
        assert!(summary.is_clean());
        assert!(pipeline.snapshot().chunk_count() >= 2);

        // State is loadable and consistent after the run.
        let state = load_state(&layout).unwrap();
        assert_eq!(state.store.manifest().indexed().count(), 2);
        let snapshot = state.snapshot.unwrap();
        assert_eq!(snapshot.chunk_count(), pipeline.snapshot().chunk_count());
    }

    #[tokio::test]
    async fn rerun_with_known_batch_leaves_snapshot_bytes_unchanged() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let embedder = Arc::new(HashEmbedder::new(8));
        let mut pipeline =
            UpdatePipeline::open(layout.clone(), embedder, small_config()).unwrap();

        pipeline.run(sample_batch()).await.unwrap();
        let snapshot_bytes = std::fs::read(layout.snapshot_path()).unwrap();
        let vector_bytes = std::fs::read(layout.embeddings_path()).unwrap();

        let summary = pipeline.run(sample_batch()).await.unwrap();
        assert!(summary.ingested.is_empty());
        assert_eq!(summary.skipped.len(), 2);

        assert_eq!(std::fs::read(layout.snapshot_path()).unwrap(), snapshot_bytes);
        assert_eq!(std::fs::read(layout.embeddings_path()).unwrap(), vector_bytes);
    }

    #[tokio::test]
    async fn empty_document_is_isolated_as_failed() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let embedder = Arc::new(HashEmbedder::new(8));
        let mut pipeline = UpdatePipeline::open(layout, embedder, small_config()).unwrap();

        let mut batch = sample_batch();
        batch.push(fetched("Blank Report", "https://example.org/blank", &["", "  "]));

        let summary = pipeline.run(batch).await.unwrap();
        assert_eq!(summary.ingested.len(), 2);
        assert_eq!(summary.failed.len(), 1);

        let blank = DocumentId::derive("Blank Report", "https://example.org/blank");
        let record = pipeline.store().get(&blank).expect("failed doc is registered");
        assert!(matches!(record.status, IngestStatus::Failed { .. }));
        // Failed documents own no chunks.
        assert!(pipeline
            .snapshot()
            .chunks()
            .iter()
            .all(|c| c.document_id != blank));
    }

    #[tokio::test]
    async fn duplicate_within_batch_is_skipped() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let embedder = Arc::new(HashEmbedder::new(8));
        let mut pipeline = UpdatePipeline::open(layout, embedder, small_config()).unwrap();

        let mut batch = sample_batch();
        batch.push(fetched("Solar Outlook", "https://example.org/solar", &["same report again"]));

        let summary = pipeline.run(batch).await.unwrap();
        assert_eq!(summary.ingested.len(), 2);
        assert_eq!(summary.skipped.len(), 1);
    }

    #[tokio::test]
    async fn model_change_requires_rebuild() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());

        let mut pipeline = UpdatePipeline::open(
            layout.clone(),
            Arc::new(HashEmbedder::new(8)),
            small_config(),
        )
        .unwrap();
        pipeline.run(sample_batch()).await.unwrap();

        // Re-open with a different model: incremental merge must refuse.
        let upgraded = Arc::new(HashEmbedder::with_model_id(8, "hash-embedder-v2"));
        let mut pipeline =
            UpdatePipeline::open(layout.clone(), upgraded.clone(), small_config()).unwrap();
        let result = pipeline.run(sample_batch()).await;
        assert!(matches!(result, Err(IngestError::ModelChanged { .. })));

        let summary = pipeline.rebuild(sample_batch()).await.unwrap();
        assert_eq!(summary.ingested.len(), 2);
        assert_eq!(pipeline.snapshot().model_id(), "hash-embedder-v2");

        let state = load_state(&layout).unwrap();
        assert_eq!(state.snapshot.unwrap().model_id(), "hash-embedder-v2");
    }

    /// Provider that always fails transiently; used to exercise the
    /// retry-then-isolate path.
    struct AlwaysRateLimited {
        dimension: usize,
    }

    #[async_trait]
    impl EmbeddingProvider for AlwaysRateLimited {
        async fn embed_batch(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
            Err(EmbeddingError::Transient("rate limited".to_string()))
        }

        fn dimension(&self) -> usize {
            self.dimension
        }

        fn model_id(&self) -> &str {
            "rate-limited-test"
        }
    }

    #[tokio::test]
    async fn exhausted_retries_downgrade_to_per_document_failure() {
        let dir = TempDir::new().unwrap();
        let layout = StorageLayout::new(dir.path());
        let embedder = Arc::new(AlwaysRateLimited { dimension: 8 });
        let mut config = small_config();
        config.embed_max_retries = 1;
        let mut pipeline = UpdatePipeline::open(layout, embedder, config).unwrap();

        let summary = pipeline.run(sample_batch()).await.unwrap();
        assert!(summary.ingested.is_empty());
        assert_eq!(summary.failed.len(), 2);
        assert!(summary.failed.iter().all(|(_, reason)| reason.contains("rate limited")));
        assert!(pipeline.snapshot().is_empty());
    }
}
