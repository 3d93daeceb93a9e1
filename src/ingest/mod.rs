//! Ingestion: keeping the persisted index synchronized with the corpus.
//!
//! The orchestrator receives scraped documents from the downloader boundary,
//! filters out already-known identifiers, chunks and embeds the rest, and
//! merges the results into the index snapshot. One bad document never aborts
//! a run; it is marked failed in the manifest and the run continues.

mod pipeline;

pub use pipeline::UpdatePipeline;

use crate::storage::DocumentId;
use std::path::PathBuf;

/// A document delivered by the scraper/downloader boundary.
///
/// `pages` is the ordered sequence of per-page plain texts extracted from
/// the PDF; scraping and download mechanics live outside this crate.
#[derive(Debug, Clone)]
pub struct FetchedDocument {
    /// Report title as scraped from the listing page
    pub title: String,
    /// Source URL of the report
    pub url: String,
    /// Local path of the downloaded PDF, if retained
    pub local_path: Option<PathBuf>,
    /// Plain text of each page, in page order
    pub pages: Vec<String>,
}

/// Phases of one ingestion run.
///
/// A run moves `Filtering → Chunking → Embedding → Merging`; scraping
/// happens before the batch reaches this crate. Individual document
/// failures in any phase are isolated, the phase sequence itself only
/// aborts on persistence errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestPhase {
    /// Dropping documents whose identifier is already in the manifest
    Filtering,
    /// Splitting page texts into chunks
    Chunking,
    /// Computing vectors, bounded concurrency across documents
    Embedding,
    /// Appending to the snapshot and persisting both artifacts
    Merging,
}

/// Per-run report: every document ends up in exactly one bucket.
///
/// Ingestion always completes with a summary rather than aborting on the
/// first bad document.
#[derive(Debug, Default)]
pub struct IngestSummary {
    /// Documents chunked, embedded, and merged this run
    pub ingested: Vec<DocumentId>,
    /// Documents skipped because their identifier was already known
    pub skipped: Vec<DocumentId>,
    /// Documents that failed, with the failure reason
    pub failed: Vec<(DocumentId, String)>,
}

impl IngestSummary {
    /// Returns true if no document failed.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// Total documents accounted for in this run.
    pub fn total(&self) -> usize {
        self.ingested.len() + self.skipped.len() + self.failed.len()
    }
}
