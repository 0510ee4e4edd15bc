//! Conversation Messages
//!
//! Standard message format used across the agent system. A `Transcript` is
//! the full ordered context sent to the model on every call, so it only
//! ever grows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Role of a message sender
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Role {
    /// System prompt/instructions
    System,
    /// User input
    User,
    /// Assistant (LLM) response
    Assistant,
    /// Tool output injected as context
    ToolResult,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::System => write!(f, "system"),
            Self::User => write!(f, "user"),
            Self::Assistant => write!(f, "assistant"),
            Self::ToolResult => write!(f, "tool-result"),
        }
    }
}

/// A single message in a conversation
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Message role
    pub role: Role,

    /// Text content
    pub content: String,

    /// Timestamp
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,

    /// Optional metadata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<MessageMetadata>,
}

/// Additional message metadata
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MessageMetadata {
    /// Tool that produced this message (tool-result messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<String>,

    /// Model that generated this (assistant messages)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ChatMessage {
    /// Create a new message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            metadata: None,
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(Role::System, content)
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }

    /// Create a tool result message
    pub fn tool_result(tool: impl Into<String>, content: impl Into<String>) -> Self {
        let mut msg = Self::new(Role::ToolResult, content);
        msg.metadata = Some(MessageMetadata {
            tool: Some(tool.into()),
            ..Default::default()
        });
        msg
    }

    /// Tag an assistant message with the model that produced it
    #[must_use]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.metadata.get_or_insert_with(MessageMetadata::default).model = Some(model.into());
        self
    }

    /// Estimate token count (rough approximation)
    pub fn estimate_tokens(&self) -> u32 {
        // ~4 characters per token, +4 for role overhead
        u32::try_from(self.content.len() / 4).unwrap_or(u32::MAX).saturating_add(4)
    }
}

/// Ordered, append-only message history of one session
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a transcript with a system prompt and the user's request
    pub fn seeded(system_prompt: impl Into<String>, request: impl Into<String>) -> Self {
        let mut transcript = Self::new();
        transcript.push(ChatMessage::system(system_prompt));
        transcript.push(ChatMessage::user(request));
        transcript
    }

    /// Append a message
    pub fn push(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }

    /// All messages, oldest first
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    /// Number of messages with the given role
    pub fn count(&self, role: Role) -> usize {
        self.messages.iter().filter(|m| m.role == role).count()
    }

    /// Estimate total tokens in the transcript
    pub fn estimate_tokens(&self) -> u32 {
        self.messages
            .iter()
            .map(ChatMessage::estimate_tokens)
            .fold(0, u32::saturating_add)
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_message_creation() {
        let msg = ChatMessage::user("Hello");
        assert_eq!(msg.role, Role::User);
        assert_eq!(msg.content, "Hello");
        assert!(msg.metadata.is_none());
    }

    #[test]
    fn test_tool_result_records_tool_name() {
        let msg = ChatMessage::tool_result("shell_command", "Return code: 0");
        assert_eq!(msg.role, Role::ToolResult);
        assert_eq!(
            msg.metadata.and_then(|m| m.tool).as_deref(),
            Some("shell_command")
        );
    }

    #[test]
    fn test_transcript_order() {
        let mut transcript = Transcript::seeded("You are helpful.", "Hi");
        transcript.push(ChatMessage::assistant("Hello!"));

        assert_eq!(transcript.len(), 3);
        let roles: Vec<Role> = transcript.messages().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
        assert_eq!(transcript.count(Role::Assistant), 1);
    }

    #[test]
    fn test_role_serializes_kebab_case() {
        let json = serde_json::to_string(&Role::ToolResult).unwrap();
        assert_eq!(json, "\"tool-result\"");
    }
}
