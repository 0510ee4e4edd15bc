//! Chat Provider Strategy
//!
//! Defines a common interface for all chat backends (OpenAI-compatible,
//! Anthropic, Ollama, ...) so the router and the agent loop never branch on
//! the vendor. Adding a vendor means adding an implementation and a registry
//! entry.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use agent_core::provider::ChatProvider;
//!
//! let response = provider.chat("gpt-4o", transcript.messages(), false).await?;
//! println!("{}", response.content);
//! ```

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::message::ChatMessage;

/// Response from one provider call
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatResponse {
    /// The generated text
    pub content: String,

    /// Model identifier that generated this response
    pub model: String,

    /// Token usage statistics (if available)
    pub usage: Option<TokenUsage>,

    /// Finish reason (if reported)
    pub finish_reason: Option<FinishReason>,
}

impl ChatResponse {
    pub fn text(model: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            model: model.into(),
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        }
    }
}

/// Token usage statistics
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Reason for completion finishing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ToolUse,
    ContentFilter,
    Error,
}

impl FinishReason {
    /// Map the vendor spellings (`stop`, `end_turn`, `max_tokens`, ...)
    pub fn from_vendor(reason: &str) -> Option<Self> {
        match reason {
            "stop" | "end_turn" | "stop_sequence" => Some(Self::Stop),
            "length" | "max_tokens" => Some(Self::Length),
            "tool_calls" | "tool_use" | "function_call" => Some(Self::ToolUse),
            "content_filter" | "refusal" => Some(Self::ContentFilter),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

/// Strategy trait for chat providers
///
/// One implementation per vendor API. The adapter performs exactly one
/// outbound call per `chat` and does not retry.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Configured provider name (registry key)
    fn name(&self) -> &str;

    /// Send the transcript, oldest first, and return the model's reply.
    ///
    /// Fails with `AgentError::Auth` when the API key is missing or
    /// rejected, `AgentError::Provider` on any other HTTP or body failure.
    async fn chat(&self, model: &str, messages: &[ChatMessage], stream: bool) -> Result<ChatResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_reason_mapping() {
        assert_eq!(FinishReason::from_vendor("end_turn"), Some(FinishReason::Stop));
        assert_eq!(FinishReason::from_vendor("max_tokens"), Some(FinishReason::Length));
        assert_eq!(FinishReason::from_vendor("length"), Some(FinishReason::Length));
        assert_eq!(FinishReason::from_vendor("whatever"), None);
    }
}
