//! Corpus manifest: the registry of known documents and their ingestion status.
//!
//! The manifest is one of the two persisted artifacts (the other being the
//! index snapshot). It maps stable document identifiers to citation metadata
//! and records whether ingestion succeeded, so failed documents are visible
//! in run summaries instead of silently vanishing.

use crate::error::StoreError;
use crate::storage::{write_atomic, StorageLayout};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use tracing::debug;

/// Stable document identifier derived from source metadata.
///
/// Identifiers are the hex SHA-256 of the normalized title and URL, so the
/// same report re-scraped under minor naming drift (case, surrounding
/// whitespace) still maps to one identifier. Uniqueness within a corpus is
/// an invariant of [`CorpusManifest`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DocumentId(String);

impl DocumentId {
    /// Derives an identifier from a document's title and source URL.
    ///
    /// Normalization: title is trimmed and lowercased, URL is trimmed.
    /// The choice of title+URL (rather than content hash) as the novelty key
    /// follows the scraper boundary: page texts are only fetched for
    /// documents that pass the novelty check.
    pub fn derive(title: &str, url: &str) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(title.trim().to_lowercase().as_bytes());
        hasher.update(b"\n");
        hasher.update(url.trim().as_bytes());
        Self(format!("{:x}", hasher.finalize()))
    }

    /// Wraps a pre-computed identifier (deserialization, tests).
    pub fn from_raw(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of a document's ingestion, recorded in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum IngestStatus {
    /// Document was chunked, embedded, and merged into the snapshot
    Indexed,
    /// Ingestion failed; the document owns no chunks
    Failed {
        /// Human-readable failure reason from the run
        reason: String,
    },
}

impl IngestStatus {
    /// Returns true for successfully indexed documents.
    pub fn is_indexed(&self) -> bool {
        matches!(self, IngestStatus::Indexed)
    }
}

/// Document metadata persisted in the manifest.
///
/// Carries everything the answer layer needs for citations: title, source
/// URL, and the local path of the downloaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    /// Stable identifier (unique within the manifest)
    pub id: DocumentId,
    /// Report title as scraped
    pub title: String,
    /// Source URL of the report
    pub url: String,
    /// Local path of the downloaded file, if retained
    pub local_path: Option<PathBuf>,
    /// When this document was ingested
    pub ingested_at: DateTime<Utc>,
    /// Whether ingestion succeeded
    pub status: IngestStatus,
}

impl DocumentRecord {
    /// Creates a record for a successfully indexed document.
    pub fn indexed(id: DocumentId, title: &str, url: &str, local_path: Option<PathBuf>) -> Self {
        Self {
            id,
            title: title.to_string(),
            url: url.to_string(),
            local_path,
            ingested_at: Utc::now(),
            status: IngestStatus::Indexed,
        }
    }

    /// Creates a record for a failed ingestion.
    pub fn failed(
        id: DocumentId,
        title: &str,
        url: &str,
        local_path: Option<PathBuf>,
        reason: String,
    ) -> Self {
        Self {
            id,
            title: title.to_string(),
            url: url.to_string(),
            local_path,
            ingested_at: Utc::now(),
            status: IngestStatus::Failed { reason },
        }
    }
}

/// Serialized form of the manifest on disk (`manifest.json`).
#[derive(Debug, Serialize, Deserialize)]
struct ManifestFile {
    schema_version: u32,
    documents: Vec<DocumentRecord>,
}

/// Manifest schema version; bump on breaking format changes.
const MANIFEST_SCHEMA_VERSION: u32 = 1;

/// In-memory registry of known documents, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct CorpusManifest {
    documents: Vec<DocumentRecord>,
    by_id: HashMap<DocumentId, usize>,
}

impl CorpusManifest {
    /// Creates an empty manifest.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the identifier has been registered.
    pub fn is_known(&self, id: &DocumentId) -> bool {
        self.by_id.contains_key(id)
    }

    /// Registers a document.
    ///
    /// Fails with [`StoreError::DuplicateDocument`] if the identifier is
    /// already present and `force` is false. A forced registration replaces
    /// the existing record in place, preserving insertion order.
    pub fn register(&mut self, record: DocumentRecord, force: bool) -> Result<(), StoreError> {
        match self.by_id.get(&record.id) {
            Some(&position) if force => {
                self.documents[position] = record;
                Ok(())
            }
            Some(_) => Err(StoreError::DuplicateDocument(record.id.to_string())),
            None => {
                self.by_id.insert(record.id.clone(), self.documents.len());
                self.documents.push(record);
                Ok(())
            }
        }
    }

    /// Looks up a record by identifier.
    pub fn get(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.by_id.get(id).map(|&position| &self.documents[position])
    }

    /// All records in insertion order.
    pub fn list(&self) -> &[DocumentRecord] {
        &self.documents
    }

    /// Number of registered documents (indexed and failed).
    pub fn len(&self) -> usize {
        self.documents.len()
    }

    /// Returns true if no documents are registered.
    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    /// Iterator over successfully indexed records.
    pub fn indexed(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.iter().filter(|d| d.status.is_indexed())
    }

    fn from_file(file: ManifestFile) -> Self {
        let by_id = file
            .documents
            .iter()
            .enumerate()
            .map(|(position, doc)| (doc.id.clone(), position))
            .collect();
        Self {
            documents: file.documents,
            by_id,
        }
    }

    fn to_file(&self) -> ManifestFile {
        ManifestFile {
            schema_version: MANIFEST_SCHEMA_VERSION,
            documents: self.documents.clone(),
        }
    }
}

/// Persistent document store: a [`CorpusManifest`] bound to its on-disk
/// location, persisted with write-new-then-atomic-replace on every
/// successful registration.
#[derive(Debug)]
pub struct DocumentStore {
    manifest: CorpusManifest,
    path: PathBuf,
}

impl DocumentStore {
    /// Opens the store, loading `manifest.json` if present.
    pub fn open(layout: &StorageLayout) -> Result<Self, StoreError> {
        let path = layout.manifest_path();
        let manifest = if path.exists() {
            let bytes = std::fs::read(&path)?;
            let file: ManifestFile = serde_json::from_slice(&bytes)?;
            debug!(documents = file.documents.len(), "loaded corpus manifest");
            CorpusManifest::from_file(file)
        } else {
            CorpusManifest::new()
        };
        Ok(Self { manifest, path })
    }

    /// Registers a document and persists the manifest.
    ///
    /// The write is atomic (temp file then rename), so a crash mid-write
    /// cannot corrupt previously committed entries.
    pub fn register(&mut self, record: DocumentRecord, force: bool) -> Result<(), StoreError> {
        self.manifest.register(record, force)?;
        self.persist()
    }

    /// Returns true if the identifier has been registered.
    pub fn is_known(&self, id: &DocumentId) -> bool {
        self.manifest.is_known(id)
    }

    /// Looks up a record by identifier.
    pub fn get(&self, id: &DocumentId) -> Option<&DocumentRecord> {
        self.manifest.get(id)
    }

    /// All records in insertion order.
    pub fn list(&self) -> &[DocumentRecord] {
        self.manifest.list()
    }

    /// The underlying manifest (for retrieval-side consumers).
    pub fn manifest(&self) -> &CorpusManifest {
        &self.manifest
    }

    /// Drops every record and persists the empty manifest. Used by forced
    /// rebuilds when the embedding model changes.
    pub fn clear(&mut self) -> Result<(), StoreError> {
        self.manifest = CorpusManifest::new();
        self.persist()
    }

    fn persist(&self) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let bytes = serde_json::to_vec_pretty(&self.manifest.to_file())?;
        write_atomic(&self.path, &bytes)
    }
}
