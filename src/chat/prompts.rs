//! Prompt templates. The wording is configuration, not logic: built-in
//! defaults can be overridden per deployment by dropping a `prompts.json`
//! into the data directory.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::models::ChatMessage;

/// Schema description appended to the response and retry prompts.
pub const FORMAT_INSTRUCTIONS: &str = "Respond with ONLY a JSON object with two keys:\n\
\"answer\": your answer to the question, formatted as markdown,\n\
\"follow_up_questions\": a list of exactly 3 follow-up questions the user may have next.\n\
Do not write anything outside the JSON object.";

const DEFAULT_AMBIGUITY_RESOLUTION: &str = "\
Given the conversation history and a follow-up question, rewrite the \
follow-up as a single standalone question. Resolve pronouns and vague \
references like \"it\" or \"that\" using the history. If the question \
already stands alone, return it unchanged. Return only the question.\n\n\
Conversation history:\n{history}\n\nFollow-up question: {question}";

const DEFAULT_RESPONSE: &str = "\
You are a teaching assistant for this course. Answer the student's \
question using ONLY the course material below. If the material does not \
cover the question, say so instead of guessing.\n\n\
Course material:\n{context}\n\n\
Conversation history:\n{history}\n\n\
Question: {question}\n\n{format_instructions}";

const DEFAULT_RETRY: &str = "\
Your previous reply could not be parsed: {error}\n\n\
Answer the question again, following the required format exactly.\n\n\
Course material:\n{context}\n\n\
Conversation history:\n{history}\n\n\
Question: {question}\n\n{format_instructions}";

/// The three templates used across one turn. Placeholders: `{history}`,
/// `{context}`, `{question}`, `{error}`, `{format_instructions}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PromptSet {
    #[serde(default = "default_ambiguity_resolution")]
    pub ambiguity_resolution: String,
    #[serde(default = "default_response")]
    pub response: String,
    #[serde(default = "default_retry")]
    pub retry: String,
}

fn default_ambiguity_resolution() -> String {
    DEFAULT_AMBIGUITY_RESOLUTION.to_string()
}

fn default_response() -> String {
    DEFAULT_RESPONSE.to_string()
}

fn default_retry() -> String {
    DEFAULT_RETRY.to_string()
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            ambiguity_resolution: default_ambiguity_resolution(),
            response: default_response(),
            retry: default_retry(),
        }
    }
}

impl PromptSet {
    /// Load overrides from `path` if it exists; missing keys keep their
    /// defaults, and an unreadable file falls back entirely.
    pub fn load_or_default(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(data) => match serde_json::from_str(&data) {
                Ok(set) => set,
                Err(e) => {
                    tracing::warn!("Ignoring malformed prompt file {}: {e}", path.display());
                    Self::default()
                }
            },
            Err(e) => {
                tracing::warn!("Could not read prompt file {}: {e}", path.display());
                Self::default()
            }
        }
    }

    pub fn render_resolution(&self, history: &str, question: &str) -> String {
        fill(
            &self.ambiguity_resolution,
            &[("history", history), ("question", question)],
        )
    }

    pub fn render_response(&self, history: &str, context: &str, question: &str) -> String {
        fill(
            &self.response,
            &[
                ("history", history),
                ("context", context),
                ("question", question),
                ("format_instructions", FORMAT_INSTRUCTIONS),
            ],
        )
    }

    pub fn render_retry(
        &self,
        error: &str,
        history: &str,
        context: &str,
        question: &str,
    ) -> String {
        fill(
            &self.retry,
            &[
                ("error", error),
                ("history", history),
                ("context", context),
                ("question", question),
                ("format_instructions", FORMAT_INSTRUCTIONS),
            ],
        )
    }
}

/// Render conversation history as plain text for prompt interpolation.
pub fn render_history(history: &[ChatMessage]) -> String {
    history
        .iter()
        .map(|m| {
            let speaker = if m.role == "assistant" {
                "Assistant"
            } else {
                "User"
            };
            format!("{speaker}: {}", m.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn fill(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(&format!("{{{name}}}"), value);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fill_replaces_all_placeholders() {
        let out = fill("{a} and {b} and {a}", &[("a", "x"), ("b", "y")]);
        assert_eq!(out, "x and y and x");
    }

    #[test]
    fn test_render_response_includes_all_inputs() {
        let prompts = PromptSet::default();
        let out = prompts.render_response("User: hi", "chunk text", "what is BM25?");
        assert!(out.contains("User: hi"));
        assert!(out.contains("chunk text"));
        assert!(out.contains("what is BM25?"));
        assert!(out.contains("exactly 3 follow-up questions"));
        assert!(!out.contains("{history}"));
        assert!(!out.contains("{format_instructions}"));
    }

    #[test]
    fn test_render_retry_includes_error() {
        let prompts = PromptSet::default();
        let out = prompts.render_retry("missing key", "", "ctx", "q");
        assert!(out.contains("missing key"));
    }

    #[test]
    fn test_render_history_labels_roles() {
        let history = vec![
            ChatMessage::user("what is hashing?"),
            ChatMessage::assistant("A hash maps input to a digest."),
        ];
        let out = render_history(&history);
        assert_eq!(
            out,
            "User: what is hashing?\nAssistant: A hash maps input to a digest."
        );
    }

    #[test]
    fn test_load_missing_file_uses_defaults() {
        let set = PromptSet::load_or_default(Path::new("/nonexistent/prompts.json"));
        assert_eq!(set.response, PromptSet::default().response);
    }

    #[test]
    fn test_load_partial_override_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(&path, r#"{"response": "custom {question}"}"#).unwrap();

        let set = PromptSet::load_or_default(&path);
        assert_eq!(set.response, "custom {question}");
        assert_eq!(set.retry, PromptSet::default().retry);
    }

    #[test]
    fn test_load_malformed_file_falls_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prompts.json");
        std::fs::write(&path, "{not json").unwrap();

        let set = PromptSet::load_or_default(&path);
        assert_eq!(set.response, PromptSet::default().response);
    }
}
