//! Result and identifier types for the search layer.

use crate::error::SearchError;
use crate::storage::DocumentId;
use serde::{Deserialize, Serialize};

/// Stable slot of a chunk in the vector index.
///
/// Slots are assigned consecutively at insertion time and never reused, so
/// a `ChunkId` doubles as the chunk's insertion order, which is what makes
/// the tie-break in [`crate::search::VectorIndex::search`] deterministic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkId(u32);

impl ChunkId {
    /// Wraps a raw slot number.
    pub fn from_u32(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw slot number.
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Slot as a usize for indexing parallel arrays.
    pub fn as_usize(&self) -> usize {
        self.0 as usize
    }
}

/// A chunk hit with its similarity score.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoredChunk {
    /// Index slot of the matching chunk
    pub id: ChunkId,
    /// Cosine similarity against the query vector
    pub score: f32,
}

/// Ranked output of stage-1 document filtering.
///
/// Typed intermediate between the two retrieval stages so stage 1 is
/// independently testable: documents in descending best-chunk score order.
#[derive(Debug, Clone, Default)]
pub struct CandidateDocuments {
    ranked: Vec<(DocumentId, f32)>,
}

impl CandidateDocuments {
    /// Builds the candidate list from ranked (id, score) pairs.
    pub fn new(ranked: Vec<(DocumentId, f32)>) -> Self {
        Self { ranked }
    }

    /// Returns true if stage 1 surfaced no candidates.
    pub fn is_empty(&self) -> bool {
        self.ranked.is_empty()
    }

    /// Number of candidate documents.
    pub fn len(&self) -> usize {
        self.ranked.len()
    }

    /// True if the document is in the candidate set.
    pub fn contains(&self, id: &DocumentId) -> bool {
        self.ranked.iter().any(|(candidate, _)| candidate == id)
    }

    /// Candidates in descending score order.
    pub fn iter(&self) -> impl Iterator<Item = (&DocumentId, f32)> {
        self.ranked.iter().map(|(id, score)| (id, *score))
    }
}

/// A retrieved passage with full citation metadata, ready for the answer
/// synthesizer.
#[derive(Debug, Clone, PartialEq)]
pub struct Passage {
    /// Owning document identifier
    pub document_id: DocumentId,
    /// Document title for the citation
    pub title: String,
    /// Source URL for the citation
    pub url: String,
    /// 1-based page the passage predominantly falls in
    pub page: usize,
    /// Passage text
    pub text: String,
    /// Cosine similarity against the question vector
    pub score: f32,
}

impl Passage {
    /// Deep link into the source document (`url#page=N`).
    pub fn link(&self) -> String {
        format!("{}#page={}", self.url, self.page)
    }
}

/// Outcome of a retrieval run.
#[derive(Debug, Clone)]
pub enum Retrieval {
    /// Stage 2 produced passages from stage-1 candidates
    Ranked {
        /// Documents that passed stage-1 filtering
        candidates: CandidateDocuments,
        /// Passages in descending relevance order
        passages: Vec<Passage>,
    },
    /// No document cleared the stage-1 score threshold. The retriever does
    /// not fall through to an unfiltered stage 2.
    NoRelevantSources,
}

/// Validates that a vector has the expected dimension.
pub fn validate_dimension(expected: usize, actual: usize) -> Result<(), SearchError> {
    if actual == expected {
        Ok(())
    } else {
        Err(SearchError::DimensionMismatch { expected, actual })
    }
}
