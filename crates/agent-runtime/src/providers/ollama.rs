//! Ollama Chat Provider
//!
//! Local inference through `ollama-rs`. No API key. Responses are always
//! requested whole; the stream flag is accepted and ignored.

use agent_core::config::ConfigError;
use agent_core::provider::{ChatProvider, ChatResponse, FinishReason};
use agent_core::{AgentError, Result, Role};
use async_trait::async_trait;
use ollama_rs::{
    generation::chat::{request::ChatMessageRequest, ChatMessage, MessageRole},
    Ollama,
};

pub const DEFAULT_PORT: u16 = 11434;

/// Ollama chat provider
pub struct OllamaProvider {
    name: String,
    client: Ollama,
}

impl OllamaProvider {
    /// Create a provider for `base_url` (`http://host:port`)
    pub fn new(name: impl Into<String>, base_url: &str) -> std::result::Result<Self, ConfigError> {
        let (host, port) = split_base_url(base_url)?;
        Ok(Self {
            name: name.into(),
            client: Ollama::new(host, port),
        })
    }

    /// Convert transcript messages to Ollama format
    fn convert_messages(messages: &[agent_core::ChatMessage]) -> Vec<ChatMessage> {
        messages
            .iter()
            .map(|m| {
                let role = match m.role {
                    Role::System => MessageRole::System,
                    Role::User | Role::ToolResult => MessageRole::User,
                    Role::Assistant => MessageRole::Assistant,
                };
                ChatMessage::new(role, m.content.clone())
            })
            .collect()
    }
}

fn split_base_url(base_url: &str) -> std::result::Result<(String, u16), ConfigError> {
    let url = reqwest::Url::parse(base_url)
        .map_err(|e| ConfigError::Validation(format!("invalid Ollama base_url `{base_url}`: {e}")))?;
    let host = url
        .host_str()
        .ok_or_else(|| ConfigError::Validation(format!("Ollama base_url `{base_url}` has no host")))?;

    Ok((
        format!("{}://{host}", url.scheme()),
        url.port().unwrap_or(DEFAULT_PORT),
    ))
}

#[async_trait]
impl ChatProvider for OllamaProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(
        &self,
        model: &str,
        messages: &[agent_core::ChatMessage],
        _stream: bool,
    ) -> Result<ChatResponse> {
        let request = ChatMessageRequest::new(model.to_string(), Self::convert_messages(messages));

        tracing::debug!(provider = %self.name, model, "Sending Ollama chat");

        let response = self
            .client
            .send_chat_messages(request)
            .await
            .map_err(|e| AgentError::provider(None, e.to_string()))?;

        Ok(ChatResponse {
            content: response.message.content,
            model: model.to_string(),
            usage: None,
            finish_reason: Some(FinishReason::Stop),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_base_url() {
        assert_eq!(
            split_base_url("http://localhost:11434").unwrap(),
            ("http://localhost".to_string(), 11434)
        );
        assert_eq!(
            split_base_url("http://gpu-box").unwrap(),
            ("http://gpu-box".to_string(), DEFAULT_PORT)
        );
        assert!(split_base_url("not a url").is_err());
    }

    #[test]
    fn test_message_conversion() {
        let messages = vec![
            agent_core::ChatMessage::system("You are helpful."),
            agent_core::ChatMessage::user("Hello"),
            agent_core::ChatMessage::tool_result("read_file", "contents"),
        ];

        let converted = OllamaProvider::convert_messages(&messages);
        assert_eq!(converted.len(), 3);
        assert_eq!(converted[2].content, "contents");
    }
}
