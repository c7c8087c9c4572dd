use std::time::Duration;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;

use crate::chat::Deadline;
use crate::error::TurnError;
use crate::models::{ChatMessage, ChatRequest, ChatResponse};
use crate::state::AppState;

const MAX_MESSAGE_CHARS: usize = 2000;
const MAX_HISTORY_MESSAGES: usize = 10;

/// POST /api/chat: one question-answering turn.
pub async fn chat(
    State(state): State<AppState>,
    Json(req): Json<ChatRequest>,
) -> Result<Json<ChatResponse>, (StatusCode, String)> {
    let message = clip(req.message.trim(), MAX_MESSAGE_CHARS);
    if message.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            "message must not be empty".to_string(),
        ));
    }

    let history = sanitize_history(req.history.unwrap_or_default());
    let deadline = Deadline::within(Duration::from_secs(state.config.turn_timeout_secs));

    match state.engine.answer(history, &message, deadline).await {
        Ok(outcome) => Ok(Json(ChatResponse {
            answer: outcome.answer.answer,
            follow_up_questions: outcome.answer.follow_up_questions,
            history: outcome.history,
            degraded: outcome.degraded,
        })),
        // Typed turn errors map to status codes; raw provider errors were
        // already absorbed into them and never reach the client
        Err(TurnError::QuestionResolution(_)) => Err((
            StatusCode::BAD_GATEWAY,
            "could not interpret the question, please try again".to_string(),
        )),
        Err(TurnError::DeadlineExceeded { stage }) => Err((
            StatusCode::GATEWAY_TIMEOUT,
            format!("turn timed out before {stage}"),
        )),
    }
}

/// Drop messages with roles other than user/assistant, clip each message,
/// and keep only the most recent `MAX_HISTORY_MESSAGES`.
fn sanitize_history(mut history: Vec<ChatMessage>) -> Vec<ChatMessage> {
    history.retain(|m| matches!(m.role.as_str(), "user" | "assistant"));
    let excess = history.len().saturating_sub(MAX_HISTORY_MESSAGES);
    history.drain(..excess);
    for m in &mut history {
        if m.content.len() > MAX_MESSAGE_CHARS {
            m.content = clip(&m.content, MAX_MESSAGE_CHARS);
        }
    }
    history
}

/// Take at most `max_bytes` of `s`, backing up to a UTF-8 char boundary.
fn clip(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let mut end = max_bytes;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}
