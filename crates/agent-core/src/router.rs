//! Chat Router
//!
//! Stateless dispatcher in front of the model registry. Validates the
//! provider/model pair before anything touches the network and bounds the
//! number of in-flight provider calls across every session sharing it.

use std::sync::Arc;

use tokio::sync::Semaphore;

use crate::error::{AgentError, Result};
use crate::message::ChatMessage;
use crate::provider::ChatResponse;
use crate::registry::{ModelMetadata, ModelRegistry};

pub const DEFAULT_MAX_CONCURRENT_CALLS: usize = 4;

pub struct ChatRouter {
    registry: Arc<ModelRegistry>,
    limiter: Arc<Semaphore>,
}

impl ChatRouter {
    pub fn new(registry: Arc<ModelRegistry>) -> Self {
        Self::with_concurrency(registry, DEFAULT_MAX_CONCURRENT_CALLS)
    }

    pub fn with_concurrency(registry: Arc<ModelRegistry>, max_concurrent_calls: usize) -> Self {
        Self {
            registry,
            limiter: Arc::new(Semaphore::new(max_concurrent_calls.max(1))),
        }
    }

    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Check that the provider is enabled and the model key exists
    pub fn validate(&self, provider: &str, model_key: &str) -> Result<&ModelMetadata> {
        self.registry.resolve(provider, model_key).map(|(_, meta)| meta)
    }

    /// Forward one chat call. `stream` is honored only for models that
    /// support it.
    pub async fn chat(
        &self,
        provider: &str,
        model_key: &str,
        messages: &[ChatMessage],
        stream: bool,
    ) -> Result<ChatResponse> {
        let (adapter, meta) = self.registry.resolve(provider, model_key)?;
        if messages.is_empty() {
            return Err(AgentError::EmptyTranscript);
        }

        let _permit = self
            .limiter
            .acquire()
            .await
            .map_err(|_| AgentError::Cancelled("provider call limiter closed".into()))?;

        let stream = stream && meta.supports_stream;
        tracing::debug!(
            provider,
            model = %meta.name,
            messages = messages.len(),
            stream,
            "Dispatching chat call"
        );
        adapter.chat(&meta.name, messages, stream).await
    }
}
