//! Retrieval over the persisted index: flat cosine vector search plus the
//! two-stage retriever (document filtering, then candidate-restricted
//! passage search).

mod retriever;
mod types;
mod vector;

pub use retriever::TwoStageRetriever;
pub use types::{
    validate_dimension, CandidateDocuments, ChunkId, Passage, Retrieval, ScoredChunk,
};
pub use vector::{cosine_similarity, VectorIndex};
