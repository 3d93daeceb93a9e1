//! Page-aware overlapping text chunking.
//!
//! Documents arrive from the scraper boundary as an ordered sequence of
//! per-page plain texts. The chunker joins the pages, slides a fixed-size
//! character window with overlap across the joined text, and attributes
//! each chunk to the page containing the majority of its characters.
//!
//! Character windows (rather than token windows) keep chunk boundaries
//! independent of any particular tokenizer, which matters because the
//! embedding model is an external network service here.

mod types;

pub use types::Chunk;

use crate::config::ChunkerConfig;
use crate::error::ChunkingError;
use crate::storage::DocumentId;

/// Splits page texts into overlapping chunks with page provenance.
#[derive(Debug, Clone)]
pub struct Chunker {
    target_chars: usize,
    overlap_chars: usize,
}

impl Chunker {
    /// Creates a chunker, validating the configuration.
    ///
    /// The overlap must be strictly smaller than the target size, otherwise
    /// the window could never advance.
    pub fn new(config: &ChunkerConfig) -> Result<Self, ChunkingError> {
        if config.target_chars == 0 {
            return Err(ChunkingError::InvalidConfig(
                "target_chars must be positive".to_string(),
            ));
        }
        if config.overlap_chars >= config.target_chars {
            return Err(ChunkingError::InvalidConfig(format!(
                "overlap ({}) must be smaller than target size ({})",
                config.overlap_chars, config.target_chars
            )));
        }
        Ok(Self {
            target_chars: config.target_chars,
            overlap_chars: config.overlap_chars,
        })
    }

    /// Splits a document into ordered chunks.
    ///
    /// # Errors
    ///
    /// Returns [`ChunkingError::EmptyDocument`] when the pages contain no
    /// non-whitespace text. Empty documents are reported, never silently
    /// dropped; the orchestrator records them as failed ingestions.
    pub fn split(
        &self,
        document_id: &DocumentId,
        pages: &[String],
    ) -> Result<Vec<Chunk>, ChunkingError> {
        // Join pages with a newline separator, tracking each page's char
        // span in the joined text. Separator chars belong to no page.
        let mut chars: Vec<char> = Vec::new();
        let mut page_spans: Vec<(usize, usize)> = Vec::with_capacity(pages.len());
        for (i, page) in pages.iter().enumerate() {
            if i > 0 {
                chars.push('\n');
            }
            let start = chars.len();
            chars.extend(page.chars());
            page_spans.push((start, chars.len()));
        }

        if chars.iter().all(|c| c.is_whitespace()) {
            return Err(ChunkingError::EmptyDocument);
        }

        let total = chars.len();
        let mut chunks = Vec::new();
        let mut start = 0;
        let mut ordinal = 0;
        loop {
            let end = (start + self.target_chars).min(total);
            chunks.push(Chunk {
                document_id: document_id.clone(),
                page: majority_page(&page_spans, start, end),
                ordinal,
                text: chars[start..end].iter().collect(),
                start_char: start,
                end_char: end,
            });
            if end == total {
                break;
            }
            start = end - self.overlap_chars;
            ordinal += 1;
        }

        Ok(chunks)
    }
}

/// Returns the 1-based page containing the majority of characters in
/// `[start, end)`. Ties go to the earlier page. A window covering only
/// separator characters falls back to the page the window starts on.
fn majority_page(page_spans: &[(usize, usize)], start: usize, end: usize) -> usize {
    let mut best_page = 0;
    let mut best_overlap = 0;
    for (i, &(page_start, page_end)) in page_spans.iter().enumerate() {
        let overlap = end.min(page_end).saturating_sub(start.max(page_start));
        if overlap > best_overlap {
            best_overlap = overlap;
            best_page = i;
        }
    }
    if best_overlap > 0 {
        return best_page + 1;
    }
    // Separator-only window: attribute to the last page starting at or
    // before the window.
    page_spans
        .iter()
        .rposition(|&(page_start, _)| page_start <= start)
        .map(|i| i + 1)
        .unwrap_or(1)
}
