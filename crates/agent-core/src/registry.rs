//! Model Registry
//!
//! Maps a provider name to its adapter and handle, and a model key to its
//! metadata. Built once from configuration; read-only afterwards.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::config::ProviderKind;
use crate::error::{AgentError, Result};
use crate::provider::ChatProvider;

/// Metadata about one configured model
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Identifier sent to the vendor API
    pub name: String,
    pub supports_tools: bool,
    pub supports_stream: bool,
    pub max_context_tokens: u32,
}

/// Resolved settings for one provider
#[derive(Clone, Debug)]
pub struct ProviderHandle {
    pub name: String,
    pub kind: ProviderKind,
    pub enabled: bool,
    pub base_url: String,
    /// Environment variable holding the API key
    pub api_key_env: Option<String>,
    /// Model key -> metadata, in configuration order
    pub models: IndexMap<String, ModelMetadata>,
}

struct ProviderEntry {
    handle: ProviderHandle,
    adapter: Arc<dyn ChatProvider>,
}

/// Read-only lookup of providers and models
#[derive(Default)]
pub struct ModelRegistry {
    providers: IndexMap<String, ProviderEntry>,
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_map()
            .entries(self.providers.iter().map(|(k, v)| (k, &v.handle)))
            .finish()
    }
}

impl ModelRegistry {
    pub fn builder() -> ModelRegistryBuilder {
        ModelRegistryBuilder::default()
    }

    /// Handle for a provider, enabled or not
    pub fn handle(&self, provider: &str) -> Option<&ProviderHandle> {
        self.providers.get(provider).map(|e| &e.handle)
    }

    /// Resolve an enabled provider and one of its models.
    ///
    /// Pure lookup: the same inputs always yield the same adapter and the
    /// same metadata instance.
    pub fn resolve(
        &self,
        provider: &str,
        model_key: &str,
    ) -> Result<(Arc<dyn ChatProvider>, &ModelMetadata)> {
        let entry = self
            .providers
            .get(provider)
            .filter(|e| e.handle.enabled)
            .ok_or_else(|| AgentError::UnknownProvider(provider.to_string()))?;

        let metadata = entry
            .handle
            .models
            .get(model_key)
            .ok_or_else(|| AgentError::UnknownModel {
                provider: provider.to_string(),
                model: model_key.to_string(),
            })?;

        Ok((Arc::clone(&entry.adapter), metadata))
    }

    /// Names of enabled providers
    pub fn enabled_providers(&self) -> Vec<&str> {
        self.providers
            .values()
            .filter(|e| e.handle.enabled)
            .map(|e| e.handle.name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}

/// Collects providers before the registry is frozen
#[derive(Default)]
pub struct ModelRegistryBuilder {
    providers: IndexMap<String, ProviderEntry>,
}

impl ModelRegistryBuilder {
    /// Register a provider; a later registration under the same name wins
    #[must_use]
    pub fn provider(mut self, handle: ProviderHandle, adapter: Arc<dyn ChatProvider>) -> Self {
        self.providers
            .insert(handle.name.clone(), ProviderEntry { handle, adapter });
        self
    }

    pub fn build(self) -> ModelRegistry {
        ModelRegistry {
            providers: self.providers,
        }
    }
}
