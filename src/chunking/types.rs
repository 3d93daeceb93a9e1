//! Chunk record types.

use crate::storage::DocumentId;
use serde::{Deserialize, Serialize};

/// A bounded text segment with page provenance: the unit of retrieval.
///
/// Chunks of one document are ordered by `ordinal` and overlap their
/// neighbors by the configured overlap, but each chunk is attributed to
/// exactly one page, the page containing the majority of its characters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Owning document identifier
    pub document_id: DocumentId,
    /// 1-based page the chunk predominantly falls in (matches PDF viewers
    /// and `#page=` deep links)
    pub page: usize,
    /// 0-based position within the document
    pub ordinal: usize,
    /// Raw chunk text
    pub text: String,
    /// Start offset in characters into the joined document text (inclusive)
    pub start_char: usize,
    /// End offset in characters (exclusive)
    pub end_char: usize,
}

impl Chunk {
    /// Chunk length in characters.
    pub fn char_len(&self) -> usize {
        self.end_char - self.start_char
    }
}
