//! Error Types
//!
//! Two families live here. `AgentError` covers failures that stop a request
//! or a session (configuration, routing, provider transport). `ToolError`
//! covers failures inside a tool run; those are narrated back to the model
//! and never end the loop.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::ConfigError;

/// Result type alias for agent operations
pub type Result<T> = std::result::Result<T, AgentError>;

/// Longest provider body excerpt kept in an error
pub const BODY_SNIPPET_CHARS: usize = 512;

/// Agent error types
#[derive(Error, Debug)]
pub enum AgentError {
    /// Bad or missing provider/tool settings
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Provider is not registered or is disabled
    #[error("Unknown provider: {0}")]
    UnknownProvider(String),

    /// Model key is not defined for the provider
    #[error("Unknown model '{model}' for provider '{provider}'")]
    UnknownModel { provider: String, model: String },

    /// A chat call was attempted with no messages
    #[error("Transcript is empty")]
    EmptyTranscript,

    /// API key missing or rejected
    #[error("Authentication failed: {0}")]
    Auth(String),

    /// Non-2xx status, transport failure, or malformed body
    #[error("{}", provider_error_text(.status, .body))]
    Provider { status: Option<u16>, body: String },

    /// Provider call exceeded its time budget
    #[error("Provider call timed out after {}s", .0.as_secs())]
    ProviderTimeout(Duration),

    /// Interrupted by the caller
    #[error("Cancelled: {0}")]
    Cancelled(String),

    /// The session already reached a terminal status
    #[error("Session {0} has already terminated")]
    SessionTerminated(String),
}

fn provider_error_text(status: &Option<u16>, body: &str) -> String {
    match status {
        Some(code) => format!("Provider error (HTTP {code}): {body}"),
        None => format!("Provider error: {body}"),
    }
}

/// Fieldless tag for an error, attached to a terminated session
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Config,
    UnknownProvider,
    UnknownModel,
    EmptyTranscript,
    Auth,
    Provider,
    ProviderTimeout,
    Cancelled,
    SessionTerminated,
}

impl AgentError {
    /// Build a provider error, keeping only the head of the body
    pub fn provider(status: Option<u16>, body: impl AsRef<str>) -> Self {
        Self::Provider {
            status,
            body: snippet(body.as_ref()),
        }
    }

    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Config(_) => ErrorKind::Config,
            Self::UnknownProvider(_) => ErrorKind::UnknownProvider,
            Self::UnknownModel { .. } => ErrorKind::UnknownModel,
            Self::EmptyTranscript => ErrorKind::EmptyTranscript,
            Self::Auth(_) => ErrorKind::Auth,
            Self::Provider { .. } => ErrorKind::Provider,
            Self::ProviderTimeout(_) => ErrorKind::ProviderTimeout,
            Self::Cancelled(_) => ErrorKind::Cancelled,
            Self::SessionTerminated(_) => ErrorKind::SessionTerminated,
        }
    }

    /// HTTP status reported by the provider, if any
    pub const fn status(&self) -> Option<u16> {
        match self {
            Self::Provider { status, .. } => *status,
            _ => None,
        }
    }

    /// Check if error is retryable: transport failures, throttling, 5xx
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Provider { status: None, .. } => true,
            Self::Provider {
                status: Some(code), ..
            } => *code == 429 || *code >= 500,
            _ => false,
        }
    }

    /// Convert to a user-friendly message
    pub fn user_message(&self) -> String {
        match self {
            Self::Config(e) => format!("The configuration is invalid: {e}"),
            Self::UnknownProvider(name) => {
                format!("Provider '{name}' is not configured or not enabled.")
            }
            Self::UnknownModel { provider, model } => {
                format!("Model '{model}' is not configured for provider '{provider}'.")
            }
            Self::Auth(msg) => format!("Authentication failed. {msg}"),
            Self::Provider { status, .. } => match status {
                Some(code) => format!("The AI service returned HTTP {code}."),
                None => "The AI service could not be reached.".into(),
            },
            Self::ProviderTimeout(_) => "The AI service took too long to respond.".into(),
            Self::Cancelled(_) => "The request was cancelled.".into(),
            Self::EmptyTranscript => "Nothing to send to the model.".into(),
            Self::SessionTerminated(_) => "This session has already finished; start a new one.".into(),
        }
    }
}

/// Failure inside a tool run. Always recoverable conversation content.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ToolError {
    #[error("tool '{0}' is not available")]
    UnknownTool(String),

    #[error("access denied: '{0}' is outside the sandbox root")]
    PathEscape(String),

    #[error("command '{0}' is not allowed")]
    CommandNotAllowed(String),

    #[error("timed out after {}s", .0.as_secs())]
    Timeout(Duration),

    #[error("I/O failure: {0}")]
    Io(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("network failure: {0}")]
    Network(String),
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

/// Truncate a provider body to `BODY_SNIPPET_CHARS` characters
pub fn snippet(body: &str) -> String {
    let body = body.trim();
    match body.char_indices().nth(BODY_SNIPPET_CHARS) {
        Some((idx, _)) => format!("{}...", &body[..idx]),
        None => body.to_string(),
    }
}
