//! The answer generation state machine.
//!
//! `DRAFTING → VALIDATING → {ACCEPTED, REPAIRING} → ACCEPTED | EXHAUSTED`
//!
//! One draft plus up to three repairs, strictly sequential: each repair
//! prompt embeds the validation error of the attempt immediately before it.
//! Exhaustion returns a fixed well-formed fallback answer, never an error,
//! and leaves the conversation history untouched.

use serde::Deserialize;
use std::future::Future;

use crate::chat::prompts::{render_history, PromptSet};
use crate::chat::Deadline;
use crate::error::TurnError;
use crate::models::{ChatMessage, StructuredAnswer};

/// Total attempts: 1 initial draft + 3 repairs.
pub const MAX_ATTEMPTS: u32 = 4;

/// Answer text returned when the retry budget is exhausted.
pub const FALLBACK_ANSWER: &str = "Something went wrong! Please try again!";

pub fn fallback_answer() -> StructuredAnswer {
    StructuredAnswer {
        answer: FALLBACK_ANSWER.to_string(),
        follow_up_questions: Vec::new(),
    }
}

/// Non-terminal generator states. The terminal outcomes are the two
/// variants of [`GenerationReport`].
#[derive(Debug)]
enum State {
    Drafting,
    /// Carries the validation error of the immediately preceding attempt.
    Repairing(String),
}

/// Terminal result of one generator invocation.
#[derive(Debug)]
pub struct GenerationReport {
    pub answer: StructuredAnswer,
    /// False when the retry budget was exhausted and `answer` is the
    /// fixed fallback.
    pub accepted: bool,
    pub attempts: u32,
}

/// Run the draft/validate/repair loop.
///
/// `call` performs one generation request; it is generic so the loop can be
/// exercised without a provider. On acceptance the resolved question and
/// answer text are appended to `history` as one user/assistant pair; on
/// exhaustion `history` is left unchanged.
pub async fn generate_answer<F, Fut>(
    prompts: &PromptSet,
    history: &mut Vec<ChatMessage>,
    context: &str,
    question: &str,
    deadline: Deadline,
    mut call: F,
) -> Result<GenerationReport, TurnError>
where
    F: FnMut(Vec<ChatMessage>) -> Fut,
    Fut: Future<Output = anyhow::Result<String>>,
{
    // History is rendered once, before this turn is appended
    let rendered_history = render_history(history);
    let mut state = State::Drafting;
    let mut attempts = 0u32;

    loop {
        if attempts > 0 {
            deadline.check("generation retry")?;
        }

        let prompt = match &state {
            State::Drafting => prompts.render_response(&rendered_history, context, question),
            State::Repairing(error) => {
                prompts.render_retry(error, &rendered_history, context, question)
            }
        };
        attempts += 1;

        // A transport failure consumes an attempt like a parse failure: the
        // caller must never see a raw provider error from this loop.
        let validated = match call(vec![ChatMessage::user(prompt)]).await {
            Ok(raw) => parse_structured_answer(&raw),
            Err(e) => Err(format!("generation call failed: {e:#}")),
        };

        match validated {
            Ok(answer) => {
                history.push(ChatMessage::user(question));
                history.push(ChatMessage::assistant(answer.answer.clone()));
                return Ok(GenerationReport {
                    answer,
                    accepted: true,
                    attempts,
                });
            }
            Err(error) => {
                tracing::warn!(
                    "Attempt {attempts} produced invalid output for {question:?}: {error}"
                );
                if attempts >= MAX_ATTEMPTS {
                    return Ok(GenerationReport {
                        answer: fallback_answer(),
                        accepted: false,
                        attempts,
                    });
                }
                state = State::Repairing(error);
            }
        }
    }
}

#[derive(Deserialize)]
struct RawAnswer {
    answer: String,
    follow_up_questions: Vec<String>,
}

/// Validate raw model text against the answer schema.
///
/// The model may wrap the JSON object in prose or a code fence, so the
/// outermost `{...}` span is extracted first. The error string is fed back
/// into the repair prompt, so it describes what to fix.
pub fn parse_structured_answer(raw: &str) -> Result<StructuredAnswer, String> {
    let start = raw
        .find('{')
        .ok_or_else(|| "no JSON object found in the output".to_string())?;
    let end = raw
        .rfind('}')
        .filter(|&e| e > start)
        .ok_or_else(|| "no closing brace found in the output".to_string())?;

    let parsed: RawAnswer = serde_json::from_str(&raw[start..=end])
        .map_err(|e| format!("output is not valid JSON for the schema: {e}"))?;

    if parsed.answer.trim().is_empty() {
        return Err("\"answer\" must be a non-empty markdown string".to_string());
    }
    if parsed.follow_up_questions.len() != 3 {
        return Err(format!(
            "\"follow_up_questions\" must contain exactly 3 questions, got {}",
            parsed.follow_up_questions.len()
        ));
    }

    Ok(StructuredAnswer {
        answer: parsed.answer,
        follow_up_questions: parsed.follow_up_questions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    const VALID: &str = r#"{"answer": "BM25 ranks by term statistics.",
        "follow_up_questions": ["What is IDF?", "What is TF?", "Why k1?"]}"#;

    fn history() -> Vec<ChatMessage> {
        vec![
            ChatMessage::user("earlier question"),
            ChatMessage::assistant("earlier answer"),
        ]
    }

    // ─── Schema validation ───────────────────────────────

    #[test]
    fn test_parse_clean_json() {
        let answer = parse_structured_answer(VALID).unwrap();
        assert_eq!(answer.answer, "BM25 ranks by term statistics.");
        assert_eq!(answer.follow_up_questions.len(), 3);
    }

    #[test]
    fn test_parse_json_in_code_fence() {
        let raw = format!("Here you go:\n```json\n{VALID}\n```\nHope that helps!");
        assert!(parse_structured_answer(&raw).is_ok());
    }

    #[test]
    fn test_parse_rejects_plain_text() {
        let err = parse_structured_answer("not json").unwrap_err();
        assert!(err.contains("no JSON object"));
    }

    #[test]
    fn test_parse_rejects_wrong_follow_up_count() {
        let raw = r#"{"answer": "ok", "follow_up_questions": ["only one"]}"#;
        let err = parse_structured_answer(raw).unwrap_err();
        assert!(err.contains("exactly 3"));
    }

    #[test]
    fn test_parse_rejects_empty_answer() {
        let raw = r#"{"answer": "  ", "follow_up_questions": ["a", "b", "c"]}"#;
        assert!(parse_structured_answer(raw).is_err());
    }

    #[test]
    fn test_parse_rejects_missing_key() {
        let raw = r#"{"answer": "ok"}"#;
        assert!(parse_structured_answer(raw).is_err());
    }

    #[test]
    fn test_parse_rejects_brace_without_close() {
        assert!(parse_structured_answer("{\"answer\": ").is_err());
    }

    // ─── Retry loop ──────────────────────────────────────

    #[tokio::test]
    async fn test_accept_on_first_valid_parse() {
        let prompts = PromptSet::default();
        let mut history = history();
        let mut calls = 0u32;

        let report = generate_answer(
            &prompts,
            &mut history,
            "context",
            "what is BM25?",
            Deadline::none(),
            |_| {
                calls += 1;
                async { Ok(VALID.to_string()) }
            },
        )
        .await
        .unwrap();

        assert!(report.accepted);
        assert_eq!(report.attempts, 1);
        assert_eq!(calls, 1);
    }

    #[tokio::test]
    async fn test_bounded_retry_then_fallback() {
        let prompts = PromptSet::default();
        let mut history = history();
        let initial_len = history.len();
        let mut calls = 0u32;

        let report = generate_answer(
            &prompts,
            &mut history,
            "context",
            "question",
            Deadline::none(),
            |_| {
                calls += 1;
                async { Ok("not json".to_string()) }
            },
        )
        .await
        .unwrap();

        assert!(!report.accepted);
        assert_eq!(report.attempts, MAX_ATTEMPTS);
        assert_eq!(calls, MAX_ATTEMPTS);
        assert_eq!(report.answer.answer, FALLBACK_ANSWER);
        assert!(report.answer.follow_up_questions.is_empty());
        // Exhaustion never appends to history
        assert_eq!(history.len(), initial_len);
    }

    #[tokio::test]
    async fn test_three_failures_then_valid_on_fourth() {
        let prompts = PromptSet::default();
        let mut history = history();
        let mut calls = 0u32;

        let report = generate_answer(
            &prompts,
            &mut history,
            "context",
            "question",
            Deadline::none(),
            |_| {
                calls += 1;
                let raw = if calls < 4 { "not json" } else { VALID };
                async move { Ok(raw.to_string()) }
            },
        )
        .await
        .unwrap();

        assert!(report.accepted);
        assert_eq!(report.attempts, 4);
        assert_eq!(report.answer.answer, "BM25 ranks by term statistics.");
    }

    #[tokio::test]
    async fn test_accepted_appends_exactly_one_turn_pair() {
        let prompts = PromptSet::default();
        let mut history = history();
        let initial_len = history.len();

        generate_answer(
            &prompts,
            &mut history,
            "context",
            "what is BM25?",
            Deadline::none(),
            |_| async { Ok(VALID.to_string()) },
        )
        .await
        .unwrap();

        assert_eq!(history.len(), initial_len + 2);
        assert_eq!(history[initial_len].role, "user");
        assert_eq!(history[initial_len].content, "what is BM25?");
        assert_eq!(history[initial_len + 1].role, "assistant");
        assert_eq!(
            history[initial_len + 1].content,
            "BM25 ranks by term statistics."
        );
    }

    #[tokio::test]
    async fn test_repair_prompt_carries_previous_error() {
        let prompts = PromptSet::default();
        let mut history = Vec::new();
        let mut prompts_seen: Vec<String> = Vec::new();

        generate_answer(
            &prompts,
            &mut history,
            "context",
            "question",
            Deadline::none(),
            |messages| {
                prompts_seen.push(messages[0].content.clone());
                let raw = if prompts_seen.len() < 2 { "garbage" } else { VALID };
                async move { Ok(raw.to_string()) }
            },
        )
        .await
        .unwrap();

        assert_eq!(prompts_seen.len(), 2);
        // Second prompt is a repair prompt embedding the first attempt's error
        assert!(prompts_seen[1].contains("no JSON object"));
        assert!(!prompts_seen[0].contains("no JSON object"));
    }

    #[tokio::test]
    async fn test_transport_failure_consumes_attempts() {
        let prompts = PromptSet::default();
        let mut history = Vec::new();
        let mut calls = 0u32;

        let report = generate_answer(
            &prompts,
            &mut history,
            "",
            "question",
            Deadline::none(),
            |_| {
                calls += 1;
                async { Err(anyhow::anyhow!("connection refused")) }
            },
        )
        .await
        .unwrap();

        assert!(!report.accepted);
        assert_eq!(calls, MAX_ATTEMPTS);
        assert_eq!(report.answer.answer, FALLBACK_ANSWER);
    }

    #[tokio::test]
    async fn test_expired_deadline_stops_between_attempts() {
        let prompts = PromptSet::default();
        let mut history = Vec::new();
        let mut calls = 0u32;
        let expired = Deadline::at(Instant::now() - Duration::from_millis(1));

        let result = generate_answer(&prompts, &mut history, "", "question", expired, |_| {
            calls += 1;
            async { Ok("not json".to_string()) }
        })
        .await;

        // The first draft runs; the check before the first repair aborts
        assert_eq!(calls, 1);
        assert!(matches!(
            result,
            Err(TurnError::DeadlineExceeded { stage: "generation retry" })
        ));
    }
}
