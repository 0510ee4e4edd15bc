//! Model reply classification.
//!
//! Agent-mode replies are expected to be one of two JSON shapes:
//!
//! ```text
//! {"tool": "<name>", "tool_input": {...}}
//! {"tool": null, "final_answer": "<text>"}
//! ```
//!
//! Anything else is plain text. One surrounding Markdown code fence is
//! stripped first because models add them even when told not to.

use serde_json::Value;

use crate::tool::{ToolCallRequest, ToolInput};

/// Classified assistant reply
#[derive(Clone, Debug, PartialEq)]
pub enum ModelReply {
    ToolCall(ToolCallRequest),
    FinalAnswer(String),
    /// Not one of the two shapes; carries the trimmed raw reply
    PlainText(String),
}

/// Classify a raw assistant reply
pub fn parse_reply(content: &str) -> ModelReply {
    let raw = content.trim();
    let body = strip_code_fence(raw);

    let Ok(Value::Object(mut object)) = serde_json::from_str::<Value>(body) else {
        return ModelReply::PlainText(raw.to_string());
    };

    match object.remove("tool") {
        Some(Value::String(name)) if !name.trim().is_empty() => {
            match object.remove("tool_input") {
                None | Some(Value::Null) => {
                    ModelReply::ToolCall(ToolCallRequest::new(name, ToolInput::new()))
                }
                Some(Value::Object(input)) => ModelReply::ToolCall(ToolCallRequest::new(name, input)),
                Some(_) => ModelReply::PlainText(raw.to_string()),
            }
        }
        Some(Value::Null) => match object.remove("final_answer") {
            Some(Value::String(answer)) if !answer.trim().is_empty() => {
                ModelReply::FinalAnswer(answer)
            }
            _ => ModelReply::PlainText(raw.to_string()),
        },
        _ => ModelReply::PlainText(raw.to_string()),
    }
}

/// True when the reply was evidently an attempt at JSON
pub fn looks_like_json(content: &str) -> bool {
    let raw = content.trim();
    raw.starts_with("```") || raw.starts_with('{')
}

fn strip_code_fence(raw: &str) -> &str {
    let Some(rest) = raw.strip_prefix("```") else {
        return raw;
    };
    // Drop the info string (```json) up to the first newline
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => return raw,
    };
    rest.trim_end()
        .strip_suffix("```")
        .unwrap_or(rest)
        .trim()
}
