//! Production configuration constants and tunable config structs.
//!
//! The constants capture the tuning the corpus was indexed with; changing
//! the chunking values only affects newly ingested documents, while changing
//! the embedding model invalidates the whole index (see
//! [`crate::ingest::UpdatePipeline::rebuild`]).

use serde::{Deserialize, Serialize};

// =============================================================================
// Chunking
// =============================================================================

/// Target chunk size in characters.
///
/// Report prose averages ~4 characters per token, so 1500 characters keeps
/// chunks comfortably inside typical embedding model context windows while
/// remaining large enough to carry a complete argument or table caption.
pub const DEFAULT_CHUNK_TARGET_CHARS: usize = 1500;

/// Characters shared between consecutive chunks.
///
/// The overlap preserves context across chunk boundaries so a sentence cut
/// at a boundary is still fully present in one of the two chunks.
pub const DEFAULT_CHUNK_OVERLAP_CHARS: usize = 150;

// =============================================================================
// Retrieval
// =============================================================================

/// Maximum candidate documents surfaced by stage-1 filtering.
pub const DEFAULT_MAX_DOCUMENTS: usize = 5;

/// Maximum passages returned by stage-2 retrieval.
pub const DEFAULT_MAX_PASSAGES: usize = 5;

/// Chunk hits examined during stage 1 before grouping by document.
///
/// Must comfortably exceed `DEFAULT_MAX_DOCUMENTS` times the typical number
/// of strong chunks per document, otherwise a single verbose report can
/// crowd every other candidate out of the stage-1 window.
pub const DEFAULT_STAGE_ONE_DEPTH: usize = 50;

/// Minimum best-chunk cosine similarity for a document to become a
/// stage-1 candidate. Documents below this are treated as noise and the
/// retriever reports "no relevant sources" rather than answering from them.
pub const DEFAULT_MIN_DOCUMENT_SCORE: f32 = 0.25;

// =============================================================================
// Ingestion
// =============================================================================

/// Concurrent documents embedded during an ingestion run.
pub const DEFAULT_EMBED_PARALLELISM: usize = 4;

/// Texts sent to the embedding endpoint per request.
pub const DEFAULT_EMBED_BATCH_SIZE: usize = 64;

/// Retries for transient embedding failures before the document is marked
/// failed for the run.
pub const DEFAULT_EMBED_MAX_RETRIES: usize = 3;

/// Base delay for exponential embedding backoff, in milliseconds.
pub const DEFAULT_EMBED_BACKOFF_MS: u64 = 250;

/// Chunker tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkerConfig {
    /// Target chunk size in characters
    pub target_chars: usize,
    /// Characters shared between consecutive chunks (must be < target)
    pub overlap_chars: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            target_chars: DEFAULT_CHUNK_TARGET_CHARS,
            overlap_chars: DEFAULT_CHUNK_OVERLAP_CHARS,
        }
    }
}

/// Two-stage retriever tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrieverConfig {
    /// Candidate documents kept after stage 1
    pub max_documents: usize,
    /// Passages returned by stage 2
    pub max_passages: usize,
    /// Chunk hits examined during stage 1 before document grouping
    pub stage_one_depth: usize,
    /// Minimum best-chunk score for a document to qualify as a candidate
    pub min_document_score: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            max_documents: DEFAULT_MAX_DOCUMENTS,
            max_passages: DEFAULT_MAX_PASSAGES,
            stage_one_depth: DEFAULT_STAGE_ONE_DEPTH,
            min_document_score: DEFAULT_MIN_DOCUMENT_SCORE,
        }
    }
}

/// Ingestion run tuning.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Chunker settings for documents ingested in this run
    pub chunker: ChunkerConfig,
    /// Concurrent documents in the embedding phase
    pub parallelism: usize,
    /// Texts per embedding request
    pub embed_batch_size: usize,
    /// Transient-failure retries per embedding request
    pub embed_max_retries: usize,
    /// Base backoff delay in milliseconds (doubled per retry)
    pub embed_backoff_ms: u64,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunker: ChunkerConfig::default(),
            parallelism: DEFAULT_EMBED_PARALLELISM,
            embed_batch_size: DEFAULT_EMBED_BATCH_SIZE,
            embed_max_retries: DEFAULT_EMBED_MAX_RETRIES,
            embed_backoff_ms: DEFAULT_EMBED_BACKOFF_MS,
        }
    }
}
