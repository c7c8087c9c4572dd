use serde::{Deserialize, Serialize};

/// An immutable unit of retrievable text. Created once at index-build time,
/// identified by `(source_id, chunk_index)`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocChunk {
    /// Opaque identifier of the origin document (relative file path)
    pub source_id: String,
    /// Position within the origin document
    pub chunk_index: usize,
    pub text: String,
}

impl DocChunk {
    /// Identity key used for dedup across retrieval paths.
    pub fn key(&self) -> (&str, usize) {
        (&self.source_id, self.chunk_index)
    }
}

/// A fused retrieval candidate. Provenance records which index contributed
/// the chunk and at what rank; both ranks are set when the chunk appeared
/// in both result lists.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub chunk: DocChunk,
    /// 0-based rank in the lexical result list, if present there
    pub lexical_rank: Option<usize>,
    /// 0-based rank in the dense result list, if present there
    pub dense_rank: Option<usize>,
    /// Weighted RRF score. Advisory: input to the re-ranker, not a final order.
    pub fused_score: f32,
}

/// The merged candidate pool for one query, with per-side failure flags.
#[derive(Debug, Clone, Default)]
pub struct CandidateSet {
    pub candidates: Vec<Candidate>,
    pub lexical_failed: bool,
    pub dense_failed: bool,
}

impl CandidateSet {
    /// True when neither retrieval path produced anything usable.
    pub fn fully_degraded(&self) -> bool {
        self.lexical_failed && self.dense_failed
    }
}

/// The schema-validated output of the answer generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StructuredAnswer {
    /// Markdown-formatted answer
    pub answer: String,
    /// Exactly 3 on success; empty on the fallback answer
    pub follow_up_questions: Vec<String>,
}

/// A single chat turn (user or assistant).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

/// Degraded-mode flags for one turn, surfaced to callers and telemetry.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct DegradedFlags {
    pub lexical_failed: bool,
    pub dense_failed: bool,
    pub rerank_failed: bool,
}

impl DegradedFlags {
    pub fn any(&self) -> bool {
        self.lexical_failed || self.dense_failed || self.rerank_failed
    }
}

/// The result of one successfully processed chat turn.
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    pub answer: StructuredAnswer,
    /// The caller's history with this turn appended (only when an answer
    /// was accepted; untouched on the fallback answer)
    pub history: Vec<ChatMessage>,
    pub degraded: DegradedFlags,
}

/// Chat request
#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    pub history: Option<Vec<ChatMessage>>,
}

/// Chat response
#[derive(Debug, Clone, Serialize)]
pub struct ChatResponse {
    pub answer: String,
    pub follow_up_questions: Vec<String>,
    pub history: Vec<ChatMessage>,
    pub degraded: DegradedFlags,
}
