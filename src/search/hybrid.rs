use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{FusionConfig, LlmConfig};
use crate::error::RetrievalError;
use crate::llm::embeddings::embed_single;
use crate::models::{Candidate, CandidateSet};
use crate::search::dense::{DenseHit, DenseIndex};
use crate::search::lexical::{LexicalHit, LexicalIndex};

/// Merges lexical and dense retrieval into one deduplicated candidate pool.
///
/// The two scoring scales are never combined arithmetically: fusion works on
/// rank positions only (weighted RRF), and the merged order is advisory
/// input to the re-ranker. Either side failing degrades the pool to the
/// surviving side rather than failing the turn.
pub struct HybridRetriever {
    pub lexical: Arc<LexicalIndex>,
    pub dense: Arc<DenseIndex>,
    pub fusion: FusionConfig,
    /// Chunks fetched from each index per query
    pub top_k: usize,
}

impl HybridRetriever {
    /// Run both index lookups concurrently and fuse the results.
    pub async fn retrieve(
        &self,
        client: &reqwest::Client,
        llm: &LlmConfig,
        query: &str,
    ) -> CandidateSet {
        let lexical_fut = async {
            let index = self.lexical.clone();
            let q = query.to_string();
            let k = self.top_k;
            match tokio::task::spawn_blocking(move || index.search(&q, k)).await {
                Ok(Ok(hits)) => Ok(hits),
                Ok(Err(e)) => Err(RetrievalError::LexicalUnavailable(e)),
                Err(e) => Err(RetrievalError::LexicalUnavailable(anyhow::anyhow!(
                    "lexical search task failed: {e}"
                ))),
            }
        };

        let dense_fut = async {
            // An embedding failure is a service failure, not an empty result:
            // the distinction drives the degraded flag upstream.
            let embedding = embed_single(client, llm, query)
                .await
                .map_err(RetrievalError::EmbeddingUnavailable)?;
            Ok::<Vec<DenseHit>, RetrievalError>(self.dense.search(&embedding, self.top_k))
        };

        let (lexical_result, dense_result) = tokio::join!(lexical_fut, dense_fut);

        let (lexical_hits, lexical_failed) = match lexical_result {
            Ok(hits) => (hits, false),
            Err(e) => {
                tracing::warn!("Lexical retrieval failed for {query:?}: {e:#}");
                (Vec::new(), true)
            }
        };

        let (dense_hits, dense_failed) = match dense_result {
            Ok(hits) => (hits, false),
            Err(e) => {
                tracing::warn!("Dense retrieval failed for {query:?}: {e:#}");
                (Vec::new(), true)
            }
        };

        CandidateSet {
            candidates: fuse(&lexical_hits, &dense_hits, &self.fusion),
            lexical_failed,
            dense_failed,
        }
    }
}

/// Fuse two independently ranked lists into a deduplicated candidate pool.
///
/// Each side contributes `weight * 1 / (rrf_k + rank + 1)` per chunk. A chunk
/// returned by both indexes keeps one entry with provenance referencing both
/// ranks and the summed score. Ties break on chunk identity so the output
/// order is stable.
pub fn fuse(lexical: &[LexicalHit], dense: &[DenseHit], fusion: &FusionConfig) -> Vec<Candidate> {
    let rrf = |rank: usize| 1.0 / (fusion.rrf_k + rank as f32 + 1.0);

    type Key = (String, usize);
    let mut pool: HashMap<Key, Candidate> = HashMap::new();

    for (rank, hit) in lexical.iter().enumerate() {
        let key = (hit.chunk.source_id.clone(), hit.chunk.chunk_index);
        let entry = pool.entry(key).or_insert_with(|| Candidate {
            chunk: hit.chunk.clone(),
            lexical_rank: None,
            dense_rank: None,
            fused_score: 0.0,
        });
        entry.lexical_rank = Some(rank);
        entry.fused_score += fusion.lexical_weight * rrf(rank);
    }

    for (rank, hit) in dense.iter().enumerate() {
        let key = (hit.chunk.source_id.clone(), hit.chunk.chunk_index);
        let entry = pool.entry(key).or_insert_with(|| Candidate {
            chunk: hit.chunk.clone(),
            lexical_rank: None,
            dense_rank: None,
            fused_score: 0.0,
        });
        entry.dense_rank = Some(rank);
        entry.fused_score += fusion.dense_weight * rrf(rank);
    }

    let mut candidates: Vec<Candidate> = pool.into_values().collect();
    candidates.sort_by(|a, b| {
        b.fused_score
            .partial_cmp(&a.fused_score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| a.chunk.key().cmp(&b.chunk.key()))
    });
    candidates
}
