//! Persisted state: corpus manifest and index snapshot.
//!
//! Two artifacts live under a user-scoped storage directory:
//!
//! - `manifest.json`: the [`CorpusManifest`] (document identifiers,
//!   citation metadata, and per-document ingestion status)
//! - `snapshot.json` + `embeddings.bin`: the [`IndexSnapshot`] (chunk
//!   records in slot order plus their vectors)
//!
//! Both are written with write-new-then-atomic-replace discipline, loaded
//! wholesale at startup, and cross-checked by [`load_state`]. The snapshot
//! has a single designated writer (the update orchestrator); readers treat
//! the loaded state as immutable within a session.

mod manifest;
mod snapshot;

pub use manifest::{CorpusManifest, DocumentId, DocumentRecord, DocumentStore, IngestStatus};
pub use snapshot::{IndexSnapshot, SNAPSHOT_SCHEMA_VERSION};

use crate::error::{CorruptionError, LoadError, StoreError};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Locations of the persisted artifacts under one storage directory.
#[derive(Debug, Clone)]
pub struct StorageLayout {
    dir: PathBuf,
}

impl StorageLayout {
    /// Creates a layout rooted at `dir`. The directory is created lazily on
    /// first write.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The storage directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the corpus manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.dir.join("manifest.json")
    }

    /// Path of the snapshot metadata (chunk records, model id, dimension).
    pub fn snapshot_path(&self) -> PathBuf {
        self.dir.join("snapshot.json")
    }

    /// Path of the raw embedding vectors.
    pub fn embeddings_path(&self) -> PathBuf {
        self.dir.join("embeddings.bin")
    }

    /// Creates the storage directory if it does not exist.
    pub fn ensure_dir(&self) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        Ok(())
    }
}

/// Writes `bytes` to `path` atomically: the content goes to a sibling temp
/// file first and is renamed over the target, so a crash mid-write leaves
/// the previous file intact.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, bytes)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// Manifest plus snapshot as loaded at process start.
#[derive(Debug)]
pub struct PersistedState {
    /// The document store (manifest bound to its path)
    pub store: DocumentStore,
    /// The index snapshot, if one has been created yet
    pub snapshot: Option<IndexSnapshot>,
}

/// Loads both artifacts and verifies their mutual consistency.
///
/// A missing snapshot with an empty manifest is a fresh corpus; a missing
/// snapshot with indexed documents in the manifest is a detectable
/// inconsistency ([`CorruptionError::SnapshotMissing`]) that requires a
/// forced rebuild. Corruption is never silently patched.
pub fn load_state(layout: &StorageLayout) -> Result<PersistedState, LoadError> {
    let store = DocumentStore::open(layout)?;
    let snapshot = IndexSnapshot::load(layout)?;

    verify_consistency(snapshot.as_ref(), store.manifest())?;

    info!(
        documents = store.list().len(),
        chunks = snapshot.as_ref().map(|s| s.chunk_count()).unwrap_or(0),
        "loaded persisted state"
    );
    Ok(PersistedState { store, snapshot })
}

/// Cross-checks snapshot and manifest.
///
/// Rules:
/// - every chunk's owning document must appear in the manifest
/// - every document marked indexed must own at least one chunk
/// - a missing snapshot is only valid while no document is indexed
pub fn verify_consistency(
    snapshot: Option<&IndexSnapshot>,
    manifest: &CorpusManifest,
) -> Result<(), CorruptionError> {
    let indexed_count = manifest.indexed().count();
    let snapshot = match snapshot {
        Some(snapshot) => snapshot,
        None => {
            if indexed_count > 0 {
                return Err(CorruptionError::SnapshotMissing {
                    documents: indexed_count,
                });
            }
            return Ok(());
        }
    };

    for chunk in snapshot.chunks() {
        if !manifest.is_known(&chunk.document_id) {
            return Err(CorruptionError::UnknownDocument(chunk.document_id.to_string()));
        }
    }

    for record in manifest.indexed() {
        if !snapshot.chunks().iter().any(|c| c.document_id == record.id) {
            return Err(CorruptionError::DanglingDocument(record.id.to_string()));
        }
    }

    Ok(())
}
