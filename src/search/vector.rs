//! Flat exact-similarity vector index.
//!
//! The index stores vectors in a single contiguous buffer and scans it
//! exhaustively per query. Exact scan was chosen over an ANN graph on
//! purpose: results must be fully deterministic (descending score, ties
//! broken by insertion slot), and report corpora are small enough (tens of
//! thousands of chunks) that a scan completes in well under a millisecond.
//!
//! Append-only: slots are assigned consecutively and never reused. Changing
//! the embedding model invalidates every stored vector; that is handled one
//! level up by rebuilding the snapshot, not by mutating the index.

use super::types::{validate_dimension, ChunkId, ScoredChunk};
use crate::error::SearchError;

/// Exact cosine-similarity index over fixed-dimension vectors.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorIndex {
    dimension: usize,
    /// Slot-major flattened vectors, `len = slots * dimension`
    vectors: Vec<f32>,
}

impl VectorIndex {
    /// Creates an empty index with a fixed dimension.
    ///
    /// The dimension is constant for the index lifetime; vectors of any
    /// other length are rejected rather than truncated or padded.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            vectors: Vec::new(),
        }
    }

    /// The fixed vector dimension.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    /// Number of stored vectors.
    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.vectors.len() / self.dimension
        }
    }

    /// Returns true if no vectors are stored.
    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Appends a vector, assigning it the next slot.
    ///
    /// # Errors
    ///
    /// [`SearchError::DimensionMismatch`] if the vector length differs from
    /// the index dimension.
    pub fn push(&mut self, vector: &[f32]) -> Result<ChunkId, SearchError> {
        validate_dimension(self.dimension, vector.len())?;
        let id = ChunkId::from_u32(self.len() as u32);
        self.vectors.extend_from_slice(vector);
        Ok(id)
    }

    /// Returns the stored vector for a slot.
    pub fn vector(&self, id: ChunkId) -> Option<&[f32]> {
        let start = id.as_usize() * self.dimension;
        self.vectors.get(start..start + self.dimension)
    }

    /// Iterates over all stored vectors in slot order.
    pub fn iter(&self) -> impl Iterator<Item = (ChunkId, &[f32])> {
        self.vectors
            .chunks_exact(self.dimension.max(1))
            .enumerate()
            .map(|(slot, vector)| (ChunkId::from_u32(slot as u32), vector))
    }

    /// Nearest chunks to `query` by cosine similarity.
    ///
    /// Results are sorted by descending score; equal scores are broken by
    /// insertion slot, earlier wins.
    ///
    /// # Errors
    ///
    /// [`SearchError::EmptyIndex`] if no vectors are stored,
    /// [`SearchError::DimensionMismatch`] if the query has the wrong length.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<ScoredChunk>, SearchError> {
        self.search_filtered(query, k, |_| true)
    }

    /// Like [`search`](Self::search), restricted to slots accepted by
    /// `filter`. Used by stage-2 retrieval to confine the scan to stage-1
    /// candidate documents.
    pub fn search_filtered<F>(
        &self,
        query: &[f32],
        k: usize,
        filter: F,
    ) -> Result<Vec<ScoredChunk>, SearchError>
    where
        F: Fn(ChunkId) -> bool,
    {
        if self.is_empty() {
            return Err(SearchError::EmptyIndex);
        }
        validate_dimension(self.dimension, query.len())?;

        let mut hits: Vec<ScoredChunk> = self
            .iter()
            .filter(|(id, _)| filter(*id))
            .map(|(id, vector)| ScoredChunk {
                id,
                score: cosine_similarity(query, vector),
            })
            .collect();

        hits.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        hits.truncate(k);
        Ok(hits)
    }
}

/// Cosine similarity in [-1, 1]. Zero vectors score 0 against everything.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(&x, &y)| x * y).sum();
    let mag_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let mag_b: f32 = b.iter().map(|y| y * y).sum::<f32>().sqrt();

    if mag_a == 0.0 || mag_b == 0.0 {
        return 0.0;
    }
    dot / (mag_a * mag_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_rejects_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        let result = index.push(&[1.0, 0.0]);
        assert!(matches!(
            result,
            Err(SearchError::DimensionMismatch {
                expected: 3,
                actual: 2
            })
        ));
    }

    #[test]
    fn search_on_empty_index_fails() {
        let index = VectorIndex::new(3);
        assert!(matches!(
            index.search(&[1.0, 0.0, 0.0], 5),
            Err(SearchError::EmptyIndex)
        ));
    }

    #[test]
    fn search_rejects_query_dimension_mismatch() {
        let mut index = VectorIndex::new(3);
        index.push(&[1.0, 0.0, 0.0]).unwrap();
        assert!(matches!(
            index.search(&[1.0, 0.0], 5),
            Err(SearchError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn results_sorted_by_descending_similarity() {
        let mut index = VectorIndex::new(2);
        index.push(&[0.0, 1.0]).unwrap(); // orthogonal
        index.push(&[1.0, 0.0]).unwrap(); // identical
        index.push(&[1.0, 1.0]).unwrap(); // 45 degrees

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        assert_eq!(hits[0].id, ChunkId::from_u32(1));
        assert_eq!(hits[1].id, ChunkId::from_u32(2));
        assert_eq!(hits[2].id, ChunkId::from_u32(0));
        assert!(hits[0].score > hits[1].score);
        assert!(hits[1].score > hits[2].score);
    }

    #[test]
    fn equal_scores_break_ties_by_insertion_order() {
        let mut index = VectorIndex::new(2);
        // Same direction, different magnitude: identical cosine scores.
        index.push(&[2.0, 0.0]).unwrap();
        index.push(&[1.0, 0.0]).unwrap();
        index.push(&[4.0, 0.0]).unwrap();

        let hits = index.search(&[1.0, 0.0], 3).unwrap();
        let ids: Vec<u32> = hits.iter().map(|h| h.id.as_u32()).collect();
        assert_eq!(ids, [0, 1, 2]);
    }

    #[test]
    fn filter_restricts_scanned_slots() {
        let mut index = VectorIndex::new(2);
        index.push(&[1.0, 0.0]).unwrap();
        index.push(&[1.0, 0.0]).unwrap();
        index.push(&[1.0, 0.0]).unwrap();

        let hits = index
            .search_filtered(&[1.0, 0.0], 10, |id| id.as_u32() != 1)
            .unwrap();
        let ids: Vec<u32> = hits.iter().map(|h| h.id.as_u32()).collect();
        assert_eq!(ids, [0, 2]);
    }

    #[test]
    fn self_similarity_is_one() {
        let mut index = VectorIndex::new(3);
        let v = [0.3, -1.2, 0.5];
        index.push(&v).unwrap();

        let hits = index.search(&v, 1).unwrap();
        assert_eq!(hits.len(), 1);
        assert!((hits[0].score - 1.0).abs() < 1e-6);
    }

    #[test]
    fn zero_vector_scores_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
    }
}
