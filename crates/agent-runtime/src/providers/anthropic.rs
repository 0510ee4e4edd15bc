//! Anthropic Messages API provider
//!
//! System messages are hoisted into the top-level `system` field; tool
//! results travel as user turns.

use std::time::Duration;

use agent_core::config::ConfigError;
use agent_core::provider::{ChatProvider, ChatResponse, FinishReason, TokenUsage};
use agent_core::{AgentError, ChatMessage, Result, Role};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{check_status, http_client, sse, transport_error, Credentials};

pub const ANTHROPIC_VERSION: &str = "2023-06-01";
pub const MAX_TOKENS: u32 = 2048;

pub struct AnthropicProvider {
    name: String,
    client: reqwest::Client,
    endpoint: String,
    credentials: Credentials,
}

#[derive(Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<WireMessage<'a>>,
    max_tokens: u32,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    stream: bool,
}

#[derive(Debug, PartialEq, Serialize)]
struct WireMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    model: Option<String>,
    #[serde(default)]
    content: Vec<ContentBlock>,
    #[serde(default)]
    stop_reason: Option<String>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize)]
struct ContentBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Clone, Copy, Default, Deserialize)]
struct Usage {
    #[serde(default)]
    input_tokens: u32,
    #[serde(default)]
    output_tokens: u32,
}

impl From<Usage> for TokenUsage {
    fn from(u: Usage) -> Self {
        Self {
            prompt_tokens: u.input_tokens,
            completion_tokens: u.output_tokens,
            total_tokens: u.input_tokens + u.output_tokens,
        }
    }
}

impl AnthropicProvider {
    pub fn new(
        name: impl Into<String>,
        base_url: &str,
        credentials: Credentials,
        timeout: Duration,
    ) -> std::result::Result<Self, ConfigError> {
        Ok(Self {
            name: name.into(),
            client: http_client(timeout)?,
            endpoint: format!("{}/messages", base_url.trim_end_matches('/')),
            credentials,
        })
    }

    /// Split out the system prompt and map the remaining turns
    fn convert_messages(messages: &[ChatMessage]) -> (Option<String>, Vec<WireMessage<'_>>) {
        let mut system: Vec<&str> = Vec::new();
        let mut converted = Vec::with_capacity(messages.len());

        for message in messages {
            match message.role {
                Role::System => system.push(&message.content),
                Role::Assistant => converted.push(WireMessage {
                    role: "assistant",
                    content: &message.content,
                }),
                Role::User | Role::ToolResult => converted.push(WireMessage {
                    role: "user",
                    content: &message.content,
                }),
            }
        }

        let system = (!system.is_empty()).then(|| system.join("\n"));
        (system, converted)
    }
}

fn parse_message(body: &str, requested_model: &str) -> Result<ChatResponse> {
    let response: MessagesResponse = serde_json::from_str(body)
        .map_err(|e| AgentError::provider(None, format!("malformed messages body: {e}")))?;

    let content = response
        .content
        .iter()
        .filter(|block| block.kind == "text")
        .filter_map(|block| block.text.as_deref())
        .collect::<Vec<_>>()
        .join("\n");

    Ok(ChatResponse {
        content,
        model: response.model.unwrap_or_else(|| requested_model.to_string()),
        usage: response.usage.map(TokenUsage::from),
        finish_reason: response.stop_reason.as_deref().and_then(FinishReason::from_vendor),
    })
}

fn accumulate_stream(payloads: &[String], requested_model: &str) -> Result<ChatResponse> {
    let mut response = ChatResponse {
        content: String::new(),
        model: requested_model.to_string(),
        usage: None,
        finish_reason: None,
    };
    let mut usage = Usage::default();

    for payload in payloads {
        let event: Value = serde_json::from_str(payload)
            .map_err(|e| AgentError::provider(None, format!("malformed stream event: {e}")))?;

        match event["type"].as_str().unwrap_or_default() {
            "message_start" => {
                if let Some(model) = event["message"]["model"].as_str() {
                    response.model = model.to_string();
                }
                if let Ok(start) = serde_json::from_value::<Usage>(event["message"]["usage"].clone()) {
                    usage.input_tokens = start.input_tokens;
                }
            }
            "content_block_delta" => {
                if let Some(text) = event["delta"]["text"].as_str() {
                    response.content.push_str(text);
                }
            }
            "message_delta" => {
                if let Some(reason) = event["delta"]["stop_reason"].as_str() {
                    response.finish_reason = FinishReason::from_vendor(reason);
                }
                if let Some(tokens) = event["usage"]["output_tokens"].as_u64() {
                    usage.output_tokens = u32::try_from(tokens).unwrap_or(u32::MAX);
                }
                response.usage = Some(usage.into());
            }
            "error" => {
                let message = event["error"]["message"].as_str().unwrap_or("stream error");
                return Err(AgentError::provider(None, message));
            }
            _ => {}
        }
    }

    Ok(response)
}

#[async_trait]
impl ChatProvider for AnthropicProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, model: &str, messages: &[ChatMessage], stream: bool) -> Result<ChatResponse> {
        let key = self.credentials.resolve()?;
        let (system, converted) = Self::convert_messages(messages);
        let body = MessagesRequest {
            model,
            system,
            messages: converted,
            max_tokens: MAX_TOKENS,
            stream,
        };

        tracing::debug!(provider = %self.name, model, stream, "Sending messages request");

        let mut request = self
            .client
            .post(&self.endpoint)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(&body);
        if let Some(key) = key {
            request = request.header("x-api-key", key);
        }
        let response = request.send().await.map_err(|e| transport_error(&e))?;
        let response = check_status(response).await?;

        if stream {
            let payloads = sse::collect_data(response.bytes_stream()).await?;
            accumulate_stream(&payloads, model)
        } else {
            let text = response.text().await.map_err(|e| transport_error(&e))?;
            parse_message(&text, model)
        }
    }
}
