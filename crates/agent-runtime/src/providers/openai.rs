//! OpenAI-compatible chat provider
//!
//! Speaks `POST {base_url}/chat/completions` with bearer auth. Used for
//! OpenAI itself and for Perplexity, which exposes the same API.

use std::time::Duration;

use agent_core::config::ConfigError;
use agent_core::provider::{ChatProvider, ChatResponse, FinishReason, TokenUsage};
use agent_core::{AgentError, ChatMessage, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{check_status, http_client, sse, transport_error, wire_role, Credentials};

pub struct OpenAiCompatible {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

impl OpenAiCompatible {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            name: name.into(),
            client: http_client(timeout)?,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            credentials,
        })
    }

    fn convert_messages(messages: &[ChatMessage]) -> Vec<WireMessage<'_>> {
        messages
            .iter()
            .map(|m| WireMessage {
                role: wire_role(m.role),
                content: &m.content,
            })
            .collect()
    }
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<Choice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Deserialize)]
struct Usage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
    #[serde(default)]
    total_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        Self {
            prompt_tokens: u.prompt_tokens,
            completion_tokens: u.completion_tokens,
            total_tokens: u.total_tokens,
        }
    }
}

#[derive(Deserialize)]
struct StreamChunk {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Delta,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Default, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

fn parse_completion(body: &str, requested_model: &str) -> Result<ChatResponse> {
    let response: CompletionResponse = serde_json::from_str(body)
        .map_err(|e| AgentError::provider(None, format!("malformed completion body: {e}")))?;

    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| AgentError::provider(None, "completion has no choices"))?;

    Ok(ChatResponse {
        content: choice.message.content.unwrap_or_default(),
        model: response.model.unwrap_or_else(|| requested_model.to_string()),
        usage: response.usage.map(TokenUsage::from),
        finish_reason: choice.finish_reason.as_deref().and_then(FinishReason::from_vendor),
    })
}

fn accumulate_stream(payloads: &[String], requested_model: &str) -> Result<ChatResponse> {
    let mut response = ChatResponse {
        content: String::new(),
        model: requested_model.to_string(),
        usage: None,
        finish_reason: None,
    };

    for payload in payloads {
        let chunk: StreamChunk = serde_json::from_str(payload)
            .map_err(|e| AgentError::provider(None, format!("malformed stream chunk: {e}")))?;
        if let Some(model) = chunk.model {
            response.model = model;
        }
        if let Some(usage) = chunk.usage {
            response.usage = Some(usage.into());
        }
        for choice in chunk.choices {
            if let Some(text) = choice.delta.content {
                response.content.push_str(&text);
            }
            if let Some(reason) = choice.finish_reason.as_deref() {
                response.finish_reason = FinishReason::from_vendor(reason);
            }
        }
    }

    Ok(response)
}

#[async_trait]
impl ChatProvider for OpenAiCompatible {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, model: &str, messages: &[ChatMessage], stream: bool) -> Result<ChatResponse> {
        let key = self.credentials.resolve()?;
        let body = CompletionRequest {
            model,
            messages: Self::convert_messages(messages),
            stream,
        };

        tracing::debug!(provider = %self.name, model, stream, "Sending chat completion");

        let mut request = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = key {
            request = request.bearer_auth(key);
        }
        let response = request.send().await.map_err(|e| transport_error(&e))?;
        let response = check_status(response).await?;

        if stream {
            let payloads = sse::collect_data(response.bytes_stream()).await?;
            accumulate_stream(&payloads, model)
        } else {
            let text = response.text().await.map_err(|e| transport_error(&e))?;
            parse_completion(&text, model)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::test_server::serve_once;

    fn provider(base_url: &str) -> OpenAiCompatible {
        OpenAiCompatible::new(
            "openai",
            base_url,
            Credentials::Static("sk-test".into()),
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[test]
    fn test_parse_completion() {
        let body = r#"{
            "model": "gpt-4o-2024-08-06",
            "choices": [{"message": {"role": "assistant", "content": "4"}, "finish_reason": "stop"}],
            "usage": {"prompt_tokens": 12, "completion_tokens": 1, "total_tokens": 13}
        }"#;
        let response = parse_completion(body, "gpt-4o").unwrap();
        assert_eq!(response.content, "4");
        assert_eq!(response.model, "gpt-4o-2024-08-06");
        assert_eq!(response.usage.unwrap().total_tokens, 13);
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    }

    #[test]
    fn test_malformed_body_is_provider_error() {
        let err = parse_completion("<html>", "gpt-4o").unwrap_err();
        assert!(matches!(err, AgentError::Provider { status: None, .. }));

        let err = parse_completion(r#"{"choices": []}"#, "gpt-4o").unwrap_err();
        assert!(matches!(err, AgentError::Provider { status: None, .. }));
    }

    #[test]
    fn test_accumulate_stream() {
        let payloads = vec![
            r#"{"model":"sonar","choices":[{"delta":{"role":"assistant"}}]}"#.to_string(),
            r#"{"choices":[{"delta":{"content":"Hel"}}]}"#.to_string(),
            r#"{"choices":[{"delta":{"content":"lo"},"finish_reason":"stop"}]}"#.to_string(),
        ];
        let response = accumulate_stream(&payloads, "sonar-small").unwrap();
        assert_eq!(response.content, "Hello");
        assert_eq!(response.model, "sonar");
        assert_eq!(response.finish_reason, Some(FinishReason::Stop));
    }

    #[tokio::test]
    async fn test_chat_round_trip() {
        let (base, server) = serve_once(
            "200 OK",
            "application/json",
            r#"{"choices":[{"message":{"content":"4"},"finish_reason":"stop"}]}"#,
        )
        .await;

        let response = provider(&base)
            .chat("gpt-4o", &[ChatMessage::system("sys"), ChatMessage::user("2+2")], false)
            .await
            .unwrap();
        assert_eq!(response.content, "4");
        assert_eq!(response.model, "gpt-4o");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /chat/completions"));
        assert!(request.to_ascii_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""messages":[{"role":"system","content":"sys"},{"role":"user","content":"2+2"}]"#));
        assert!(!request.contains(r#""stream""#));
    }

    #[tokio::test]
    async fn test_streamed_chat() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"2+2=\"}}]}\n\n\
                    data: {\"choices\":[{\"delta\":{\"content\":\"4\"}}]}\n\n\
                    data: [DONE]\n\n";
        let (base, server) = serve_once("200 OK", "text/event-stream", body).await;

        let response = provider(&base)
            .chat("gpt-4o", &[ChatMessage::user("2+2")], true)
            .await
            .unwrap();
        assert_eq!(response.content, "2+2=4");
        assert!(server.await.unwrap().contains(r#""stream":true"#));
    }

    #[tokio::test]
    async fn test_http_errors_are_mapped() {
        let (base, _server) = serve_once("500 Internal Server Error", "text/plain", "upstream exploded").await;
        let err = provider(&base)
            .chat("gpt-4o", &[ChatMessage::user("hi")], false)
            .await
            .unwrap_err();
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("upstream exploded"));

        let (base, _server) = serve_once("401 Unauthorized", "application/json", r#"{"error":"bad key"}"#).await;
        let err = provider(&base)
            .chat("gpt-4o", &[ChatMessage::user("hi")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }

    #[tokio::test]
    async fn test_missing_key_makes_no_request() {
        let provider = OpenAiCompatible::new(
            "openai",
            "http://127.0.0.1:9",
            Credentials::Env("AGENT_RUNTIME_TEST_KEY_THAT_IS_NOT_SET".into()),
            Duration::from_secs(1),
        )
        .unwrap();
        let err = provider
            .chat("gpt-4o", &[ChatMessage::user("hi")], false)
            .await
            .unwrap_err();
        assert!(matches!(err, AgentError::Auth(_)));
    }
}
