//! Cross-encoder re-ranking via an OpenAI-compatible `/v1/rerank` endpoint.
//!
//! One batch request carries all query-candidate pairs, so the re-rank stage
//! adds a single round trip per turn regardless of candidate count.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::config::RerankerConfig;

/// Relevance judgment for a single candidate.
#[derive(Debug, Clone)]
pub struct RerankResult {
    /// Index into the submitted documents slice.
    pub index: usize,
    /// Relevance score in 0.0 - 1.0 after sigmoid normalization.
    pub score: f32,
}

#[derive(Deserialize)]
struct RerankBody {
    results: Vec<ScoredDocument>,
}

#[derive(Deserialize)]
struct ScoredDocument {
    index: usize,
    relevance_score: f32,
}

/// Score `documents` against `query` with the cross-encoder sidecar.
///
/// Returns up to `top_n` results sorted by score descending. Errors when the
/// endpoint is unconfigured or unreachable; the caller decides the degraded
/// fallback.
pub async fn rerank(
    client: &reqwest::Client,
    config: &RerankerConfig,
    query: &str,
    documents: &[String],
    top_n: usize,
) -> Result<Vec<RerankResult>> {
    let base_url = config
        .base_url
        .as_deref()
        .context("Reranker base_url not configured")?;

    let response = client
        .post(format!("{}/v1/rerank", base_url.trim_end_matches('/')))
        .timeout(std::time::Duration::from_secs(config.timeout_secs.min(30)))
        .json(&serde_json::json!({
            "model": config.model.as_deref().unwrap_or("default"),
            "query": query,
            "documents": documents,
            "top_n": top_n,
        }))
        .send()
        .await
        .context("Failed to reach reranker endpoint")?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        anyhow::bail!("Reranker returned {status}: {body}");
    }

    let body: RerankBody = response
        .json()
        .await
        .context("Failed to parse reranker response")?;

    // A misbehaving sidecar can echo indexes outside the submitted range
    let mut results: Vec<RerankResult> = body
        .results
        .into_iter()
        .filter(|doc| doc.index < documents.len())
        .map(|doc| RerankResult {
            index: doc.index,
            score: sigmoid(doc.relevance_score),
        })
        .collect();

    results.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    results.truncate(top_n);

    Ok(results)
}

/// Sigmoid normalization: maps raw cross-encoder logits to 0-1.
pub fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sigmoid_midpoint_at_zero() {
        assert!((sigmoid(0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_sigmoid_saturates_at_extremes() {
        assert!(sigmoid(10.0) > 0.999);
        assert!(sigmoid(-10.0) < 0.001);
    }

    #[test]
    fn test_sigmoid_is_antisymmetric_around_half() {
        let x = 2.5f32;
        assert!((sigmoid(x) + sigmoid(-x) - 1.0).abs() < 1e-6);
    }

    #[tokio::test]
    async fn test_unconfigured_reranker_is_an_error() {
        let client = reqwest::Client::new();
        let config = RerankerConfig::default(); // base_url: None
        let result = rerank(&client, &config, "query", &["doc".to_string()], 5).await;
        assert!(result.is_err());
    }
}
