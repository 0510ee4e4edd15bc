//! Configuration Snapshot
//!
//! `AppConfig` is loaded once at process start (YAML or TOML, chosen by file
//! extension), validated, and then handed by reference to the registry
//! builders and the agent. Nothing mutates it afterwards.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::prompts::PromptConfig;
use crate::registry::ModelMetadata;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: `{0}`")]
    NotFound(PathBuf),
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse YAML config: {0}")]
    ParseYaml(#[from] serde_yaml::Error),
    #[error("could not parse TOML config: {0}")]
    ParseToml(#[from] toml::de::Error),
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

/// Whole-process configuration snapshot
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub providers: IndexMap<String, ProviderConfig>,
    pub tools: ToolsConfig,
    pub prompts: PromptConfig,
    pub agent: AgentSettings,
    pub logging: LoggingConfig,
}

/// Vendor API family of a provider
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    OpenAi,
    Perplexity,
    Anthropic,
    Ollama,
}

impl ProviderKind {
    /// Infer the kind from a provider's configured name
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "openai" => Some(Self::OpenAi),
            "perplexity" => Some(Self::Perplexity),
            "anthropic" => Some(Self::Anthropic),
            "ollama" => Some(Self::Ollama),
            _ => None,
        }
    }

    pub const fn default_base_url(self) -> &'static str {
        match self {
            Self::OpenAi => "https://api.openai.com/v1",
            Self::Perplexity => "https://api.perplexity.ai",
            Self::Anthropic => "https://api.anthropic.com/v1",
            Self::Ollama => "http://localhost:11434",
        }
    }

    /// Ollama runs locally and takes no key
    pub const fn default_api_key_env(self) -> Option<&'static str> {
        match self {
            Self::OpenAi => Some("OPENAI_API_KEY"),
            Self::Perplexity => Some("PERPLEXITY_API_KEY"),
            Self::Anthropic => Some("ANTHROPIC_API_KEY"),
            Self::Ollama => None,
        }
    }

    pub const fn default_context_tokens(self) -> u32 {
        match self {
            Self::Anthropic => 200_000,
            _ => 8192,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default)]
    pub enabled: bool,

    /// Falls back to `ProviderKind::from_name` when omitted
    #[serde(default)]
    pub kind: Option<ProviderKind>,

    #[serde(default)]
    pub api_key_env: Option<String>,

    #[serde(default)]
    pub base_url: Option<String>,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub models: IndexMap<String, ModelConfig>,
}

const fn default_provider_timeout() -> u64 {
    120
}

impl ProviderConfig {
    pub fn resolve_kind(&self, name: &str) -> Result<ProviderKind, ConfigError> {
        self.kind
            .or_else(|| ProviderKind::from_name(name))
            .ok_or_else(|| {
                ConfigError::Validation(format!(
                    "provider `{name}` needs a `kind` (openai|perplexity|anthropic|ollama)"
                ))
            })
    }

    pub fn base_url(&self, kind: ProviderKind) -> String {
        self.base_url
            .clone()
            .unwrap_or_else(|| kind.default_base_url().to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn api_key_env(&self, kind: ProviderKind) -> Option<String> {
        self.api_key_env
            .clone()
            .or_else(|| kind.default_api_key_env().map(String::from))
    }

    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Identifier sent to the vendor API
    pub name: String,

    #[serde(default)]
    pub supports_tools: bool,

    #[serde(default = "default_true")]
    pub supports_stream: bool,

    #[serde(default)]
    pub max_context_tokens: Option<u32>,
}

const fn default_true() -> bool {
    true
}

impl ModelConfig {
    pub fn to_metadata(&self, kind: ProviderKind) -> ModelMetadata {
        ModelMetadata {
            name: self.name.clone(),
            supports_tools: self.supports_tools,
            supports_stream: self.supports_stream,
            max_context_tokens: self
                .max_context_tokens
                .unwrap_or_else(|| kind.default_context_tokens()),
        }
    }
}

/// Tool settings keyed by tool name
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    pub shell: Option<ShellToolConfig>,
    pub read_file: Option<FileToolConfig>,
    pub write_file: Option<FileToolConfig>,
    pub web_search: Option<WebSearchConfig>,
    pub web_fetch: Option<WebFetchConfig>,

    /// Anything else is rejected during validation
    #[serde(flatten, skip_serializing)]
    pub unknown: IndexMap<String, serde_json::Value>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct ShellToolConfig {
    pub enabled: bool,
    pub working_dir: PathBuf,
    /// Empty list means unrestricted
    pub allowed_commands: Vec<String>,
    pub timeout_secs: u64,
    pub max_output_bytes: usize,
}

impl Default for ShellToolConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            working_dir: PathBuf::from("workspace"),
            allowed_commands: vec!["ls".into(), "echo".into()],
            timeout_secs: 30,
            max_output_bytes: 64 * 1024,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct FileToolConfig {
    pub enabled: bool,
    pub root_dir: PathBuf,
    /// Read limit; ignored by write_file
    pub max_chars: usize,
}

impl Default for FileToolConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            root_dir: PathBuf::from("workspace"),
            max_chars: 8000,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebSearchConfig {
    pub enabled: bool,
    /// Falls back to `SEARCH_API_ENDPOINT`
    pub endpoint: Option<String>,
    /// When set, the named variable must be present
    pub api_key_env: Option<String>,
    pub timeout_secs: u64,
}

impl Default for WebSearchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: None,
            api_key_env: None,
            timeout_secs: 15,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct WebFetchConfig {
    pub enabled: bool,
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for WebFetchConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_chars: 4000,
            timeout_secs: 15,
        }
    }
}

/// Agent loop settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentSettings {
    pub max_steps: usize,
    pub provider_timeout_secs: u64,
    /// Request streamed responses from models that support it
    pub stream: bool,
    /// Upper bound on in-flight provider calls across all sessions
    pub max_concurrent_calls: usize,
    pub retry: RetryPolicy,
    pub malformed_reply: MalformedReplyPolicy,
}

impl Default for AgentSettings {
    fn default() -> Self {
        Self {
            max_steps: 4,
            provider_timeout_secs: 120,
            stream: false,
            max_concurrent_calls: 4,
            retry: RetryPolicy::default(),
            malformed_reply: MalformedReplyPolicy::default(),
        }
    }
}

/// Caller-layered retry for transient provider failures
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Total attempts per model call; 1 disables retry
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            initial_backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    /// Backoff before attempt `attempt + 1`, doubling each time
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u64 << attempt.saturating_sub(1).min(16);
        Duration::from_millis(self.initial_backoff_ms.saturating_mul(factor))
    }
}

/// What to do with a reply that looks like JSON but matches neither shape
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum MalformedReplyPolicy {
    /// Return the raw text as the final answer
    #[default]
    PassThrough,
    /// Remind the model of the format, at most `max_attempts` times per session
    Reprompt { max_attempts: u32 },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".into(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConfigFormat {
    Yaml,
    Toml,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("toml") => Self::Toml,
            _ => Self::Yaml,
        }
    }
}

impl AppConfig {
    /// Read, parse, and validate a configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let raw = fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(&raw, ConfigFormat::from_path(path))?;
        tracing::debug!(
            path = %path.display(),
            providers = config.providers.len(),
            "Loaded configuration"
        );
        Ok(config)
    }

    /// Parse and validate configuration text
    pub fn parse(raw: &str, format: ConfigFormat) -> Result<Self, ConfigError> {
        let config: Self = if raw.trim().is_empty() {
            Self::default()
        } else {
            match format {
                ConfigFormat::Yaml => serde_yaml::from_str(raw)?,
                ConfigFormat::Toml => toml::from_str(raw)?,
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, provider) in &self.providers {
            provider.resolve_kind(name)?;
            for (key, model) in &provider.models {
                if model.name.trim().is_empty() {
                    return Err(ConfigError::Validation(format!(
                        "model `{key}` of provider `{name}` has an empty `name`"
                    )));
                }
            }
        }

        if let Some(name) = self.tools.unknown.keys().next() {
            return Err(ConfigError::Validation(format!(
                "unknown tool `{name}` (expected shell|read_file|write_file|web_search|web_fetch)"
            )));
        }

        if self.agent.retry.max_attempts == 0 {
            return Err(ConfigError::Validation(
                "agent.retry.max_attempts must be at least 1".into(),
            ));
        }
        if self.agent.max_concurrent_calls == 0 {
            return Err(ConfigError::Validation(
                "agent.max_concurrent_calls must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub const fn provider_timeout(&self) -> Duration {
        Duration::from_secs(self.agent.provider_timeout_secs)
    }
}
