//! Answer synthesizer boundary and cited-answer assembly.
//!
//! The language model is an external collaborator behind
//! [`AnswerSynthesizer`]: it receives the question plus ranked passages and
//! returns free text. This module guarantees the passages arrive in
//! descending relevance order with complete citation metadata, and that the
//! caller gets either a cited answer or an explicit insufficient-sources
//! result, never a fabricated citation.

use crate::error::{AnswerError, SynthesisError};
use crate::search::{Passage, Retrieval, TwoStageRetriever};
use async_trait::async_trait;
use tracing::info;

/// Boundary trait for answer generation.
#[async_trait]
pub trait AnswerSynthesizer: Send + Sync {
    /// Generates answer text for `question` grounded in `passages`.
    ///
    /// Passages are ordered by descending relevance; each carries title,
    /// page, URL, and the raw text.
    async fn generate(
        &self,
        question: &str,
        passages: &[Passage],
    ) -> Result<String, SynthesisError>;
}

/// One cited source of an answer.
#[derive(Debug, Clone, PartialEq)]
pub struct Citation {
    /// Document title
    pub title: String,
    /// Source URL
    pub url: String,
    /// 1-based page of the cited passage
    pub page: usize,
    /// Deep link into the document (`url#page=N`)
    pub link: String,
}

impl Citation {
    fn from_passage(passage: &Passage) -> Self {
        Self {
            title: passage.title.clone(),
            url: passage.url.clone(),
            page: passage.page,
            link: passage.link(),
        }
    }
}

/// A grounded answer with its sources.
#[derive(Debug, Clone)]
pub struct CitedAnswer {
    /// Free-text answer from the synthesizer
    pub answer: String,
    /// Sources backing the answer, in descending relevance order
    pub sources: Vec<Citation>,
}

/// Outcome of the question-answering flow.
#[derive(Debug, Clone)]
pub enum Answer {
    /// The corpus contained relevant passages and an answer was generated
    Cited(CitedAnswer),
    /// No document cleared the relevance threshold; no answer is invented
    InsufficientSources,
}

impl Answer {
    /// Returns true if no relevant sources were found.
    pub fn is_insufficient(&self) -> bool {
        matches!(self, Answer::InsufficientSources)
    }
}

/// Runs retrieval and synthesis for a question.
///
/// # Errors
///
/// Propagates [`crate::error::SearchError::EmptyIndex`] when no ingestion
/// has run yet, and synthesis failures. An empty candidate set is not an
/// error; it yields [`Answer::InsufficientSources`].
pub async fn answer_question(
    retriever: &TwoStageRetriever<'_>,
    synthesizer: &dyn AnswerSynthesizer,
    question: &str,
) -> Result<Answer, AnswerError> {
    let passages = match retriever.retrieve(question).await? {
        Retrieval::NoRelevantSources => {
            info!("no relevant sources for question");
            return Ok(Answer::InsufficientSources);
        }
        Retrieval::Ranked { passages, .. } => passages,
    };
    if passages.is_empty() {
        return Ok(Answer::InsufficientSources);
    }

    let answer = synthesizer.generate(question, &passages).await?;
    let sources = passages.iter().map(Citation::from_passage).collect();
    Ok(Answer::Cited(CitedAnswer { answer, sources }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::Chunk;
    use crate::config::RetrieverConfig;
    use crate::storage::{CorpusManifest, DocumentId, DocumentRecord, IndexSnapshot};
    use crate::test_utils::HashEmbedder;

    /// Synthesizer that records how many passages it saw.
    struct EchoSynthesizer;

    #[async_trait]
    impl AnswerSynthesizer for EchoSynthesizer {
        async fn generate(
            &self,
            question: &str,
            passages: &[Passage],
        ) -> Result<String, SynthesisError> {
            Ok(format!("answer to '{question}' from {} passages", passages.len()))
        }
    }

    fn corpus() -> (IndexSnapshot, CorpusManifest) {
        let mut manifest = CorpusManifest::new();
        let mut snapshot = IndexSnapshot::new("hash-embedder-v1", 8);

        let id = DocumentId::derive("Solar Outlook", "https://example.org/solar");
        manifest
            .register(
                DocumentRecord::indexed(id.clone(), "Solar Outlook", "https://example.org/solar", None),
                false,
            )
            .unwrap();

        let text = "solar capacity grew strongly this year";
        let chunk = Chunk {
            document_id: id,
            page: 3,
            ordinal: 0,
            text: text.to_string(),
            start_char: 0,
            end_char: text.chars().count(),
        };
        let vector = crate::test_utils::hash_embed(text, 8);
        snapshot.append(vec![chunk], vec![vector]).unwrap();
        (snapshot, manifest)
    }

    #[tokio::test]
    async fn answer_carries_citations_from_retrieved_passages() {
        let (snapshot, manifest) = corpus();
        let embedder = HashEmbedder::new(8);
        let retriever = TwoStageRetriever::new(
            &snapshot,
            &manifest,
            &embedder,
            RetrieverConfig::default(),
        );

        // Asking with the chunk's own text maximizes similarity; the single
        // chunk must come back as the sole source.
        let outcome = answer_question(
            &retriever,
            &EchoSynthesizer,
            "solar capacity grew strongly this year",
        )
        .await
        .unwrap();

        let cited = match outcome {
            Answer::Cited(cited) => cited,
            Answer::InsufficientSources => panic!("expected a cited answer"),
        };
        assert_eq!(cited.sources.len(), 1);
        assert_eq!(cited.sources[0].title, "Solar Outlook");
        assert_eq!(cited.sources[0].page, 3);
        assert_eq!(cited.sources[0].link, "https://example.org/solar#page=3");
        assert!(cited.answer.contains("1 passages"));
    }

    #[tokio::test]
    async fn below_threshold_question_yields_insufficient_sources() {
        let (snapshot, manifest) = corpus();
        let embedder = HashEmbedder::new(8);
        let retriever = TwoStageRetriever::new(
            &snapshot,
            &manifest,
            &embedder,
            RetrieverConfig {
                min_document_score: 1.1,
                ..RetrieverConfig::default()
            },
        );

        let outcome = answer_question(&retriever, &EchoSynthesizer, "unrelated").await.unwrap();
        assert!(outcome.is_insufficient());
    }
}
