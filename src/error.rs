//! Error types for reportmind.
//!
//! This module defines the error taxonomy used across the crate: document
//! store, chunking, embedding, search, snapshot corruption, and ingestion
//! errors. Each concern gets its own enum so callers can match on exactly
//! the failures they can handle.

use thiserror::Error;

/// Errors that can occur in the document store and on-disk persistence.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Registration of an identifier that is already present (without force)
    #[error("duplicate document: {0}")]
    DuplicateDocument(String),
    /// Filesystem error while reading or writing an artifact
    #[error("I/O error: {0}")]
    Io(String),
    /// Failed to serialize or deserialize a persisted artifact
    #[error("serialization error: {0}")]
    Serialization(String),
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Serialization(err.to_string())
    }
}

/// Errors that can occur during text chunking.
#[derive(Debug, Clone, Error)]
pub enum ChunkingError {
    /// Document contained no extractable text (empty or unparseable).
    /// Surfaced so the orchestrator can mark the document failed rather
    /// than silently dropping it.
    #[error("document produced no usable text")]
    EmptyDocument,
    /// Invalid chunking configuration
    #[error("invalid chunking config: {0}")]
    InvalidConfig(String),
}

/// Errors that can occur at the embedding model boundary.
///
/// The transient/permanent split drives retry behavior: `Transient` failures
/// (rate limits, transport errors, 5xx) are retried with exponential backoff,
/// `Permanent` failures are not.
#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    /// Retryable failure (rate limit, timeout, server error)
    #[error("transient embedding failure: {0}")]
    Transient(String),
    /// Non-retryable failure (bad request, auth, malformed response)
    #[error("permanent embedding failure: {0}")]
    Permanent(String),
    /// Model returned a vector of the wrong dimension
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was built with
        expected: usize,
        /// Dimension the model returned
        actual: usize,
    },
}

/// Errors that can occur during retrieval.
#[derive(Debug, Clone, Error)]
pub enum SearchError {
    /// The index contains no chunks; ingestion must run first
    #[error("index is empty; run ingestion first")]
    EmptyIndex,
    /// Query vector dimension does not match the index
    #[error("dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension the index was built with
        expected: usize,
        /// Dimension of the supplied vector
        actual: usize,
    },
    /// Question embedding failed
    #[error("embedding error: {0}")]
    Embedding(String),
    /// Internal index inconsistency (slot without chunk, unknown document)
    #[error("index error: {0}")]
    Index(String),
}

/// Manifest/snapshot inconsistencies detected at load time.
///
/// These are fatal for querying until a forced rebuild is run; they are
/// never silently patched.
#[derive(Debug, Clone, Error)]
pub enum CorruptionError {
    /// Manifest lists indexed documents but no snapshot exists
    #[error("index snapshot missing for {documents} indexed documents; forced rebuild required")]
    SnapshotMissing {
        /// Number of documents the manifest claims are indexed
        documents: usize,
    },
    /// Snapshot metadata exists but the vector file is missing
    #[error("embedding vectors file missing")]
    VectorsMissing,
    /// Vector file length inconsistent with chunk count and dimension
    #[error("vector file length mismatch: expected {expected} values, got {actual}")]
    VectorLengthMismatch {
        /// `chunk_count * dimension`
        expected: usize,
        /// Number of values actually present
        actual: usize,
    },
    /// A chunk references a document absent from the manifest
    #[error("chunk references unknown document {0}")]
    UnknownDocument(String),
    /// A document is marked indexed but owns no chunks (failed ingestion
    /// that was recorded as successful, or a partial merge)
    #[error("document {0} is marked indexed but has no chunks")]
    DanglingDocument(String),
    /// Snapshot was written by an incompatible schema version
    #[error("unsupported snapshot schema version {found} (supported: {supported})")]
    UnsupportedSchema {
        /// Version found on disk
        found: u32,
        /// Version this build reads
        supported: u32,
    },
}

/// Errors raised while loading persisted state at startup.
#[derive(Debug, Error)]
pub enum LoadError {
    /// Artifact could not be read or parsed
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Artifacts loaded but are mutually inconsistent
    #[error(transparent)]
    Corruption(#[from] CorruptionError),
}

/// Errors that abort an entire ingestion run.
///
/// Per-document failures are *not* represented here; they are isolated and
/// reported through the run summary. These variants cover conditions where
/// continuing would corrupt the persisted state.
#[derive(Debug, Error)]
pub enum IngestError {
    /// The embedding model differs from the one the index was built with.
    /// Incremental merge is invalid; a full rebuild is required.
    #[error("embedding model changed from {index_model} to {provider_model}; rebuild required")]
    ModelChanged {
        /// Model recorded in the index snapshot
        index_model: String,
        /// Model the configured provider reports
        provider_model: String,
    },
    /// Chunker configuration is invalid for the whole run
    #[error(transparent)]
    Chunking(#[from] ChunkingError),
    /// Persistence failure while committing manifest or snapshot
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Index-level failure while merging vectors
    #[error(transparent)]
    Index(#[from] SearchError),
}

/// Errors from the answer synthesizer boundary.
#[derive(Debug, Clone, Error)]
pub enum SynthesisError {
    /// The language model call failed
    #[error("answer synthesis failed: {0}")]
    Failed(String),
}

/// Errors raised by the question-answering flow.
#[derive(Debug, Error)]
pub enum AnswerError {
    /// Retrieval failed (including `SearchError::EmptyIndex`)
    #[error(transparent)]
    Search(#[from] SearchError),
    /// Synthesis failed after successful retrieval
    #[error(transparent)]
    Synthesis(#[from] SynthesisError),
}
