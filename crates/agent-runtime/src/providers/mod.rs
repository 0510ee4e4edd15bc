//! Vendor chat adapters
//!
//! One `ChatProvider` per vendor API family. Every adapter makes exactly one
//! HTTP call per `chat` and maps failures onto the shared taxonomy:
//! missing or rejected key -> `Auth`, any other non-2xx -> `Provider` with
//! the status, transport or body failure -> `Provider` without a status.

use std::sync::Arc;
use std::time::Duration;

use agent_core::config::{AppConfig, ConfigError, ProviderKind};
use agent_core::error::snippet;
use agent_core::registry::{ModelRegistry, ProviderHandle};
use agent_core::{AgentError, ChatProvider, Role};

pub mod anthropic;
#[cfg(feature = "ollama")]
pub mod ollama;
pub mod openai;
mod sse;

pub use anthropic::AnthropicProvider;
#[cfg(feature = "ollama")]
pub use ollama::OllamaProvider;
pub use openai::OpenAiCompatible;

/// Where an adapter gets its API key
#[derive(Clone, Debug)]
pub enum Credentials {
    /// Keyless endpoint
    None,
    /// Read from this environment variable at call time
    Env(String),
    /// Fixed key
    Static(String),
}

impl Credentials {
    /// Resolve the key for one call. An unset or empty variable is an
    /// authentication failure, raised before any network traffic.
    pub fn resolve(&self) -> agent_core::Result<Option<String>> {
        match self {
            Self::None => Ok(None),
            Self::Static(key) => Ok(Some(key.clone())),
            Self::Env(var) => std::env::var(var)
                .ok()
                .filter(|key| !key.trim().is_empty())
                .map(Some)
                .ok_or_else(|| AgentError::Auth(format!("environment variable '{var}' is not set"))),
        }
    }
}

/// Build the model registry for every configured provider.
///
/// Disabled providers are registered too so that lookups report them as
/// unavailable rather than unknown to the configuration.
pub fn build_model_registry(config: &AppConfig) -> Result<ModelRegistry, ConfigError> {
    let mut builder = ModelRegistry::builder();

    for (name, provider) in &config.providers {
        let kind = provider.resolve_kind(name)?;
        let handle = ProviderHandle {
            name: name.clone(),
            kind,
            enabled: provider.enabled,
            base_url: provider.base_url(kind),
            api_key_env: provider.api_key_env(kind),
            models: provider
                .models
                .iter()
                .map(|(key, model)| (key.clone(), model.to_metadata(kind)))
                .collect(),
        };

        let credentials = handle
            .api_key_env
            .clone()
            .map_or(Credentials::None, Credentials::Env);
        let timeout = provider.timeout();

        let adapter: Arc<dyn ChatProvider> = match kind {
            ProviderKind::OpenAi | ProviderKind::Perplexity => Arc::new(OpenAiCompatible::new(
                name,
                &handle.base_url,
                credentials,
                timeout,
            )?),
            ProviderKind::Anthropic => Arc::new(AnthropicProvider::new(
                name,
                &handle.base_url,
                credentials,
                timeout,
            )?),
            ProviderKind::Ollama => ollama_adapter(name, &handle.base_url)?,
        };

        tracing::debug!(
            provider = %name,
            ?kind,
            enabled = handle.enabled,
            models = handle.models.len(),
            "Registered provider"
        );
        builder = builder.provider(handle, adapter);
    }

    Ok(builder.build())
}

#[cfg(feature = "ollama")]
fn ollama_adapter(name: &str, base_url: &str) -> Result<Arc<dyn ChatProvider>, ConfigError> {
    Ok(Arc::new(OllamaProvider::new(name, base_url)?))
}

#[cfg(not(feature = "ollama"))]
fn ollama_adapter(name: &str, _base_url: &str) -> Result<Arc<dyn ChatProvider>, ConfigError> {
    Err(ConfigError::Validation(format!(
        "provider `{name}` needs the `ollama` feature"
    )))
}

pub(crate) fn http_client(timeout: Duration) -> Result<reqwest::Client, ConfigError> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ConfigError::Validation(format!("cannot build HTTP client: {e}")))
}

/// Pass 2xx responses through; map everything else onto `AgentError`
pub(crate) async fn check_status(response: reqwest::Response) -> agent_core::Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    if status == reqwest::StatusCode::UNAUTHORIZED || status == reqwest::StatusCode::FORBIDDEN {
        return Err(AgentError::Auth(format!(
            "provider rejected the API key (HTTP {}): {}",
            status.as_u16(),
            snippet(&body)
        )));
    }
    Err(AgentError::provider(Some(status.as_u16()), body))
}

pub(crate) fn transport_error(err: &reqwest::Error) -> AgentError {
    AgentError::provider(err.status().map(|s| s.as_u16()), err.to_string())
}

/// Wire role for chat-completions style APIs. Tool output goes back as
/// user context.
pub(crate) const fn wire_role(role: Role) -> &'static str {
    match role {
        Role::System => "system",
        Role::User | Role::ToolResult => "user",
        Role::Assistant => "assistant",
    }
}

#[cfg(test)]
pub(crate) mod test_server {
    //! One-shot HTTP server for adapter tests.

    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::task::JoinHandle;

    /// Serve one canned response; the handle yields the raw request
    pub async fn serve_once(status: &str, content_type: &str, body: &str) -> (String, JoinHandle<String>) {
        serve_raw(format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        ))
        .await
    }

    /// Redirect once to `location`
    pub async fn redirect_once(location: &str) -> (String, JoinHandle<String>) {
        serve_raw(format!(
            "HTTP/1.1 302 Found\r\nLocation: {location}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n"
        ))
        .await
    }

    async fn serve_raw(response: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.ok();
            request
        });

        (format!("http://{addr}"), handle)
    }

    async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0_u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf);
            if let Some(end) = text.find("\r\n\r\n") {
                let length = text[..end]
                    .lines()
                    .find_map(|line| {
                        let (name, value) = line.split_once(':')?;
                        name.eq_ignore_ascii_case("content-length")
                            .then(|| value.trim().parse::<usize>().ok())
                            .flatten()
                    })
                    .unwrap_or(0);
                if buf.len() >= end + 4 + length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }
}
