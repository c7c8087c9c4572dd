//! Question resolution: rewrite an ambiguous follow-up into a standalone
//! question before retrieval sees it.

use crate::chat::prompts::{render_history, PromptSet};
use crate::error::TurnError;
use crate::llm::provider::ProviderChain;
use crate::models::ChatMessage;

/// One LLM call over `{history, question}`. No retry at this layer: a
/// provider failure aborts the turn, because retrieving against an
/// unresolved, possibly-ambiguous question would silently degrade answers.
pub async fn resolve_question(
    client: &reqwest::Client,
    chain: &ProviderChain,
    prompts: &PromptSet,
    history: &[ChatMessage],
    question: &str,
) -> Result<String, TurnError> {
    let prompt = prompts.render_resolution(&render_history(history), question);

    let output = chain
        .generate(client, &[ChatMessage::user(prompt)])
        .await
        .map_err(|e| {
            tracing::error!("Question resolution failed for {question:?}: {e:#}");
            TurnError::QuestionResolution(e)
        })?;

    let resolved = output.trim();
    if resolved.is_empty() {
        // A blank rewrite is useless; the raw question is the safer input
        tracing::warn!("Resolver returned empty output for {question:?}, keeping original");
        Ok(question.to_string())
    } else {
        Ok(resolved.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    #[tokio::test]
    async fn test_provider_failure_is_a_resolution_error() {
        let client = reqwest::Client::new();
        let bad = LlmConfig {
            provider: "mystery".to_string(),
            ..LlmConfig::default()
        };
        let chain = ProviderChain::new(bad, None);
        let prompts = PromptSet::default();

        let result = resolve_question(&client, &chain, &prompts, &[], "what about it?").await;
        assert!(matches!(result, Err(TurnError::QuestionResolution(_))));
    }
}
