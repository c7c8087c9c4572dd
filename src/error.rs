//! Typed error taxonomy for the chat pipeline.
//!
//! Malformed generation output is deliberately absent here: it is recovered
//! inside the answer generator's repair loop and never escapes as an error.

use thiserror::Error;

/// A retrieval-path failure. Recovered locally where possible: the hybrid
/// retriever fails open to the surviving side and the re-ranker falls back
/// to fusion order.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("embedding service unavailable")]
    EmbeddingUnavailable(#[source] anyhow::Error),

    #[error("lexical index unavailable")]
    LexicalUnavailable(#[source] anyhow::Error),

    #[error("re-ranking service unavailable")]
    RerankUnavailable(#[source] anyhow::Error),
}

/// A turn-level failure surfaced to the caller. Distinct from the fallback
/// answer: these mean no answer was attempted for the turn at all.
#[derive(Debug, Error)]
pub enum TurnError {
    /// The resolver's model call failed. Not retried: an unresolved,
    /// possibly-ambiguous question must not proceed to retrieval.
    #[error("question resolution failed")]
    QuestionResolution(#[source] anyhow::Error),

    #[error("deadline exceeded before {stage}")]
    DeadlineExceeded { stage: &'static str },
}
