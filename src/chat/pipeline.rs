//! The turn pipeline: resolve → retrieve → re-rank → assemble → generate.

use std::collections::HashSet;

use crate::chat::answer::generate_answer;
use crate::chat::prompts::PromptSet;
use crate::chat::resolve::resolve_question;
use crate::chat::Deadline;
use crate::config::{LlmConfig, RerankerConfig};
use crate::error::{RetrievalError, TurnError};
use crate::llm::cross_encoder::{self, RerankResult};
use crate::llm::provider::ProviderChain;
use crate::models::{Candidate, ChatMessage, DegradedFlags, DocChunk, TurnOutcome};
use crate::search::hybrid::HybridRetriever;

/// The chat engine: indexes and provider clients wired together once at
/// startup, then shared read-only across concurrent turns.
pub struct ChatEngine {
    pub client: reqwest::Client,
    pub llm: LlmConfig,
    pub chain: ProviderChain,
    pub reranker: RerankerConfig,
    pub retriever: HybridRetriever,
    pub prompts: PromptSet,
}

impl ChatEngine {
    /// Process one chat turn. Side effects only on the returned copy of
    /// history: accepted answers append one user/assistant pair, the
    /// fallback answer appends nothing.
    pub async fn answer(
        &self,
        history: Vec<ChatMessage>,
        raw_question: &str,
        deadline: Deadline,
    ) -> Result<TurnOutcome, TurnError> {
        deadline.check("question resolution")?;
        let question =
            resolve_question(&self.client, &self.chain, &self.prompts, &history, raw_question)
                .await?;
        tracing::info!("Resolved {raw_question:?} to {question:?}");

        deadline.check("retrieval")?;
        let set = self
            .retriever
            .retrieve(&self.client, &self.llm, &question)
            .await;
        if set.fully_degraded() {
            // Empty-context answers are hallucination-prone; make the
            // condition loud for telemetry even though the turn continues
            tracing::error!(
                "Both retrieval paths failed for {question:?}; answering with empty context"
            );
        }

        let mut degraded = DegradedFlags {
            lexical_failed: set.lexical_failed,
            dense_failed: set.dense_failed,
            rerank_failed: false,
        };

        deadline.check("re-ranking")?;
        let top_k = self.retriever.top_k;
        let reranked = if set.candidates.is_empty() {
            Vec::new()
        } else {
            let texts: Vec<String> = set
                .candidates
                .iter()
                .map(|c| c.chunk.text.clone())
                .collect();
            match cross_encoder::rerank(&self.client, &self.reranker, &question, &texts, top_k)
                .await
                .map_err(RetrievalError::RerankUnavailable)
            {
                Ok(results) => apply_rerank(&set.candidates, &results, top_k),
                Err(e) => {
                    tracing::warn!(
                        "Re-ranking failed for {question:?}, falling back to fusion order: {e:#}"
                    );
                    degraded.rerank_failed = true;
                    fusion_order(&set.candidates, top_k)
                }
            }
        };

        let context = assemble_context(&reranked);

        deadline.check("generation")?;
        let mut history = history;
        let report = generate_answer(
            &self.prompts,
            &mut history,
            &context,
            &question,
            deadline,
            |messages| {
                let client = self.client.clone();
                let chain = self.chain.clone();
                async move { chain.generate(&client, &messages).await }
            },
        )
        .await?;

        if !report.accepted {
            tracing::warn!(
                "Answer generation exhausted {} attempts for {question:?}",
                report.attempts
            );
        }
        if degraded.any() {
            tracing::warn!(
                "Turn answered degraded for {question:?} (lexical_failed={}, dense_failed={}, rerank_failed={})",
                degraded.lexical_failed,
                degraded.dense_failed,
                degraded.rerank_failed
            );
        }

        Ok(TurnOutcome {
            answer: report.answer,
            history,
            degraded,
        })
    }
}

/// Reorder candidates by cross-encoder score and cut to `top_k`. Guards
/// against a misbehaving provider repeating indexes: the dedup invariant
/// holds on the output as well.
pub fn apply_rerank(
    candidates: &[Candidate],
    results: &[RerankResult],
    top_k: usize,
) -> Vec<DocChunk> {
    let mut seen: HashSet<(String, usize)> = HashSet::new();
    let mut out = Vec::new();

    for result in results {
        let Some(candidate) = candidates.get(result.index) else {
            continue;
        };
        let key = (
            candidate.chunk.source_id.clone(),
            candidate.chunk.chunk_index,
        );
        if seen.insert(key) {
            out.push(candidate.chunk.clone());
        }
        if out.len() >= top_k {
            break;
        }
    }

    out
}

/// Degraded path: the candidate pool's pre-rerank order truncated to `top_k`.
pub fn fusion_order(candidates: &[Candidate], top_k: usize) -> Vec<DocChunk> {
    candidates
        .iter()
        .take(top_k)
        .map(|c| c.chunk.clone())
        .collect()
}

/// Join chunk texts with a blank line, in rank order. Empty input produces
/// an empty string.
pub fn assemble_context(chunks: &[DocChunk]) -> String {
    chunks
        .iter()
        .map(|c| c.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn candidate(source: &str, index: usize, text: &str) -> Candidate {
        Candidate {
            chunk: DocChunk {
                source_id: source.to_string(),
                chunk_index: index,
                text: text.to_string(),
            },
            lexical_rank: None,
            dense_rank: None,
            fused_score: 0.0,
        }
    }

    #[test]
    fn test_assemble_context_empty() {
        assert_eq!(assemble_context(&[]), "");
    }

    #[test]
    fn test_assemble_context_joins_with_blank_line() {
        let chunks = vec![
            DocChunk {
                source_id: "a.md".into(),
                chunk_index: 0,
                text: "first".into(),
            },
            DocChunk {
                source_id: "b.md".into(),
                chunk_index: 0,
                text: "second".into(),
            },
        ];
        assert_eq!(assemble_context(&chunks), "first\n\nsecond");
    }

    #[test]
    fn test_apply_rerank_reorders_by_score() {
        let candidates = vec![
            candidate("a.md", 0, "a"),
            candidate("b.md", 0, "b"),
            candidate("c.md", 0, "c"),
        ];
        // Cross-encoder prefers c, then a, then b
        let results = vec![
            RerankResult { index: 2, score: 0.9 },
            RerankResult { index: 0, score: 0.7 },
            RerankResult { index: 1, score: 0.1 },
        ];
        let reranked = apply_rerank(&candidates, &results, 5);
        let sources: Vec<&str> = reranked.iter().map(|c| c.source_id.as_str()).collect();
        assert_eq!(sources, vec!["c.md", "a.md", "b.md"]);
    }

    #[test]
    fn test_apply_rerank_respects_top_k() {
        let candidates: Vec<Candidate> = (0..10)
            .map(|i| candidate(&format!("{i}.md"), 0, "text"))
            .collect();
        let results: Vec<RerankResult> = (0..10)
            .map(|i| RerankResult {
                index: i,
                score: 1.0 - i as f32 * 0.05,
            })
            .collect();
        assert_eq!(apply_rerank(&candidates, &results, 5).len(), 5);
    }

    #[test]
    fn test_apply_rerank_skips_bad_and_duplicate_indexes() {
        let candidates = vec![candidate("a.md", 0, "a")];
        let results = vec![
            RerankResult { index: 7, score: 0.9 }, // out of range
            RerankResult { index: 0, score: 0.8 },
            RerankResult { index: 0, score: 0.7 }, // duplicate
        ];
        let reranked = apply_rerank(&candidates, &results, 5);
        assert_eq!(reranked.len(), 1);
        assert_eq!(reranked[0].source_id, "a.md");
    }

    #[test]
    fn test_fusion_order_preserves_pre_rerank_order() {
        let candidates = vec![
            candidate("first.md", 0, "1"),
            candidate("second.md", 0, "2"),
            candidate("third.md", 0, "3"),
        ];
        let chunks = fusion_order(&candidates, 2);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].source_id, "first.md");
        assert_eq!(chunks[1].source_id, "second.md");
    }
}
