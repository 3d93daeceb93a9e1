//! Index snapshot: persisted vector index plus chunk metadata.
//!
//! On disk the snapshot is a pair of files: `embeddings.bin` holds the raw
//! little-endian `f32` vectors in slot order, `snapshot.json` holds the
//! schema version, embedding model id, dimension, and chunk records. Writes
//! go vectors first and `snapshot.json` last, each with atomic replace, so
//! `snapshot.json` acts as the commit point: a crash mid-merge leaves either
//! the old or the new consistent snapshot, never a half-written one.

use crate::chunking::Chunk;
use crate::error::{CorruptionError, LoadError, SearchError, StoreError};
use crate::search::{ChunkId, VectorIndex};
use crate::storage::{write_atomic, StorageLayout};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

/// Snapshot schema version; bump on breaking format changes.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

/// Serialized form of the snapshot metadata (`snapshot.json`).
#[derive(Debug, Serialize, Deserialize)]
struct SnapshotFile {
    schema_version: u32,
    model_id: String,
    dimension: usize,
    chunks: Vec<Chunk>,
}

/// In-memory index snapshot: chunk records and their vectors, one slot per
/// chunk. Single-writer (the update orchestrator); readers treat a loaded
/// snapshot as immutable for the session.
#[derive(Debug, Clone)]
pub struct IndexSnapshot {
    model_id: String,
    chunks: Vec<Chunk>,
    index: VectorIndex,
}

impl IndexSnapshot {
    /// Creates an empty snapshot for the given embedding model.
    pub fn new(model_id: impl Into<String>, dimension: usize) -> Self {
        Self {
            model_id: model_id.into(),
            chunks: Vec::new(),
            index: VectorIndex::new(dimension),
        }
    }

    /// Identifier of the embedding model the vectors were computed with.
    /// A different model means the whole index must be rebuilt, not merged.
    pub fn model_id(&self) -> &str {
        &self.model_id
    }

    /// Fixed embedding dimension.
    pub fn dimension(&self) -> usize {
        self.index.dimension()
    }

    /// Number of indexed chunks.
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Returns true if no chunks are indexed.
    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    /// Chunk record for a slot.
    pub fn chunk(&self, id: ChunkId) -> Option<&Chunk> {
        self.chunks.get(id.as_usize())
    }

    /// All chunk records in slot order.
    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    /// The underlying vector index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// Identifiers of documents owning at least one chunk.
    pub fn document_ids(&self) -> HashSet<&crate::storage::DocumentId> {
        self.chunks.iter().map(|c| &c.document_id).collect()
    }

    /// Appends chunks with their vectors, assigning consecutive slots.
    ///
    /// Incremental by design: no existing slot is touched. Returns the
    /// assigned slots in input order.
    ///
    /// # Errors
    ///
    /// [`SearchError::Index`] if the two lists differ in length,
    /// [`SearchError::DimensionMismatch`] if any vector has the wrong
    /// dimension (nothing is appended in that case).
    pub fn append(
        &mut self,
        chunks: Vec<Chunk>,
        vectors: Vec<Vec<f32>>,
    ) -> Result<Vec<ChunkId>, SearchError> {
        if chunks.len() != vectors.len() {
            return Err(SearchError::Index(format!(
                "{} chunks with {} vectors",
                chunks.len(),
                vectors.len()
            )));
        }
        for vector in &vectors {
            crate::search::validate_dimension(self.dimension(), vector.len())?;
        }

        let mut slots = Vec::with_capacity(chunks.len());
        for (chunk, vector) in chunks.into_iter().zip(vectors) {
            let slot = self.index.push(&vector)?;
            debug_assert_eq!(slot.as_usize(), self.chunks.len());
            self.chunks.push(chunk);
            slots.push(slot);
        }
        Ok(slots)
    }

    /// Persists the snapshot pair atomically.
    pub fn save(&self, layout: &StorageLayout) -> Result<(), StoreError> {
        layout.ensure_dir()?;

        let mut vector_bytes = Vec::with_capacity(self.chunks.len() * self.dimension() * 4);
        for (_, vector) in self.index.iter() {
            for value in vector {
                vector_bytes.extend_from_slice(&value.to_le_bytes());
            }
        }
        write_atomic(&layout.embeddings_path(), &vector_bytes)?;

        let file = SnapshotFile {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            model_id: self.model_id.clone(),
            dimension: self.dimension(),
            chunks: self.chunks.clone(),
        };
        // Commit point: readers only see the new vectors once this rename
        // lands.
        write_atomic(&layout.snapshot_path(), &serde_json::to_vec_pretty(&file)?)?;

        info!(
            chunks = self.chunks.len(),
            dimension = self.dimension(),
            "persisted index snapshot"
        );
        Ok(())
    }

    /// Loads the snapshot pair, verifying internal consistency.
    ///
    /// Returns `Ok(None)` when no snapshot has been created yet. Whether
    /// "no snapshot" is valid depends on the manifest and is decided by
    /// [`crate::storage::verify_consistency`].
    pub fn load(layout: &StorageLayout) -> Result<Option<Self>, LoadError> {
        let snapshot_path = layout.snapshot_path();
        if !snapshot_path.exists() {
            return Ok(None);
        }

        let bytes = std::fs::read(&snapshot_path).map_err(StoreError::from)?;
        let file: SnapshotFile = serde_json::from_slice(&bytes).map_err(StoreError::from)?;

        if file.schema_version != SNAPSHOT_SCHEMA_VERSION {
            return Err(CorruptionError::UnsupportedSchema {
                found: file.schema_version,
                supported: SNAPSHOT_SCHEMA_VERSION,
            }
            .into());
        }

        let embeddings_path = layout.embeddings_path();
        if !embeddings_path.exists() {
            return Err(CorruptionError::VectorsMissing.into());
        }
        let vector_bytes = std::fs::read(&embeddings_path).map_err(StoreError::from)?;

        let expected = file.chunks.len() * file.dimension;
        let actual = vector_bytes.len() / 4;
        if vector_bytes.len() % 4 != 0 || actual != expected {
            return Err(CorruptionError::VectorLengthMismatch { expected, actual }.into());
        }

        let mut index = VectorIndex::new(file.dimension);
        let mut vector = vec![0.0f32; file.dimension];
        for (slot, raw) in vector_bytes.chunks_exact(file.dimension * 4).enumerate() {
            for (value, le) in vector.iter_mut().zip(raw.chunks_exact(4)) {
                *value = f32::from_le_bytes([le[0], le[1], le[2], le[3]]);
            }
            let id = index.push(&vector).map_err(|e| {
                StoreError::Serialization(format!("slot {slot}: {e}"))
            })?;
            debug_assert_eq!(id.as_usize(), slot);
        }

        debug!(
            chunks = file.chunks.len(),
            model = %file.model_id,
            "loaded index snapshot"
        );
        Ok(Some(Self {
            model_id: file.model_id,
            chunks: file.chunks,
            index,
        }))
    }
}
