//! Scripted providers and recording tools for unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::config::ProviderKind;
use crate::error::{AgentError, Result, ToolError};
use crate::message::ChatMessage;
use crate::provider::{ChatProvider, ChatResponse};
use crate::registry::{ModelMetadata, ProviderHandle};
use crate::tool::{ParameterSchema, Tool, ToolInput, ToolSchema};

#[derive(Clone, Debug)]
pub enum Scripted {
    Text(String),
    Fail { status: Option<u16>, body: String },
    Auth,
    /// Never resolves
    Hang,
}

pub struct ScriptedProvider {
    name: String,
    replies: Mutex<VecDeque<Scripted>>,
    fallback: Option<Scripted>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedProvider {
    pub fn new<S: Into<String>>(name: &str, replies: impl IntoIterator<Item = S>) -> Self {
        Self::scripted(name, replies.into_iter().map(|r| Scripted::Text(r.into())))
    }

    pub fn scripted(name: &str, replies: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            name: name.to_string(),
            replies: Mutex::new(replies.into_iter().collect()),
            fallback: None,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    /// Answer every call with the same reply
    pub fn repeating(name: &str, reply: Scripted) -> Self {
        let mut provider = Self::scripted(name, []);
        provider.fallback = Some(reply);
        provider
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Transcripts received, one per call
    pub fn seen(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    fn name(&self) -> &str {
        &self.name
    }

    async fn chat(&self, model: &str, messages: &[ChatMessage], _stream: bool) -> Result<ChatResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(messages.to_vec());

        let next = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .or_else(|| self.fallback.clone());

        match next {
            Some(Scripted::Text(text)) => Ok(ChatResponse::text(model, text)),
            Some(Scripted::Fail { status, body }) => Err(AgentError::provider(status, body)),
            Some(Scripted::Auth) => Err(AgentError::Auth("environment variable 'TEST_KEY' is not set".into())),
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(AgentError::provider(None, "script exhausted")),
        }
    }
}

pub fn handle(name: &str, enabled: bool, models: &[(&str, &str)]) -> ProviderHandle {
    let models: IndexMap<String, ModelMetadata> = models
        .iter()
        .map(|(key, id)| {
            (
                (*key).to_string(),
                ModelMetadata {
                    name: (*id).to_string(),
                    supports_tools: false,
                    supports_stream: true,
                    max_context_tokens: 8192,
                },
            )
        })
        .collect();
    ProviderHandle {
        name: name.to_string(),
        kind: ProviderKind::OpenAi,
        enabled,
        base_url: "http://localhost:0".into(),
        api_key_env: None,
        models,
    }
}

/// Tool that records its inputs and returns a fixed outcome
pub struct RecordingTool {
    name: String,
    outcome: std::result::Result<String, ToolError>,
    required: Vec<String>,
    hang: bool,
    calls: Mutex<Vec<ToolInput>>,
}

impl RecordingTool {
    pub fn ok(name: &str, output: &str) -> Self {
        Self::with_outcome(name, Ok(output.to_string()))
    }

    pub fn with_outcome(name: &str, outcome: std::result::Result<String, ToolError>) -> Self {
        Self {
            name: name.to_string(),
            outcome,
            required: Vec::new(),
            hang: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn requiring(mut self, param: &str) -> Self {
        self.required.push(param.to_string());
        self
    }

    pub fn hanging(mut self) -> Self {
        self.hang = true;
        self
    }

    pub fn calls(&self) -> Vec<ToolInput> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for RecordingTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: self.name.clone(),
            description: format!("Test tool {}", self.name),
            parameters: self
                .required
                .iter()
                .map(|p| ParameterSchema::required(p, "string", "test parameter"))
                .collect(),
        }
    }

    async fn run(&self, input: &ToolInput) -> std::result::Result<String, ToolError> {
        self.calls.lock().unwrap().push(input.clone());
        if self.hang {
            std::future::pending::<()>().await;
        }
        self.outcome.clone()
    }
}
