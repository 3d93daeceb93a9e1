//! # Reportmind
//!
//! Library for question answering over a corpus of scraped PDF reports.
//!
//! This crate ingests page-extracted report text into a persistent embedding
//! index and answers questions with a two-stage retrieval flow: first rank
//! whole documents by their best chunk, then search passages inside the
//! surviving documents. Answers are synthesized by an external model behind
//! a trait boundary and always carry page-level citations.
//!
//! ## Modules
//!
//! - [`ingest`] - Update pipeline (filter, chunk, embed, merge, persist)
//! - [`search`] - Flat cosine index and the two-stage retriever
//! - [`storage`] - Corpus manifest, index snapshot, and on-disk layout
//! - [`chunking`] - Page-aware overlapping character windows
//! - [`embedding`] - Embedding provider trait and OpenAI-compatible client
//! - [`answer`] - Answer synthesizer boundary and citation assembly
//! - [`config`] - Tunable parameters with production defaults
//! - [`error`] - Error types for each stage of the pipeline

pub mod answer;
pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod ingest;
pub mod search;
pub mod storage;

#[cfg(test)]
pub(crate) mod test_utils;

pub use answer::{answer_question, Answer, AnswerSynthesizer, CitedAnswer};
pub use embedding::{EmbeddingProvider, OpenAiEmbedder};
pub use ingest::{FetchedDocument, IngestSummary, UpdatePipeline};
pub use search::{Passage, Retrieval, TwoStageRetriever};
pub use storage::{DocumentId, DocumentRecord, StorageLayout};
