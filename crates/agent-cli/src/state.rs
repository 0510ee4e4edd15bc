//! Application State

use std::sync::Arc;

use anyhow::Context;

use agent_core::{Agent, AgentBuilder, AgentConfig, AppConfig, ChatRouter, PromptConfig, ToolRegistry};
use agent_runtime::{build_model_registry, build_tool_registry};

/// Everything a command needs, built once from the configuration snapshot
#[derive(Clone)]
pub struct AppState {
    /// Provider/model dispatch
    pub router: Arc<ChatRouter>,

    /// Enabled tools
    pub tools: Arc<ToolRegistry>,

    pub prompts: Arc<PromptConfig>,

    /// Loop settings from `agent:`
    pub agent: AgentConfig,
}

impl AppState {
    pub fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let registry = build_model_registry(config).context("failed to set up providers")?;
        let tools = build_tool_registry(&config.tools).context("failed to set up tools")?;

        tracing::info!(
            providers = ?registry.enabled_providers(),
            tools = ?tools.names(),
            "Configuration loaded"
        );

        Ok(Self {
            router: Arc::new(ChatRouter::with_concurrency(
                Arc::new(registry),
                config.agent.max_concurrent_calls,
            )),
            tools: Arc::new(tools),
            prompts: Arc::new(config.prompts.clone()),
            agent: AgentConfig::from(&config.agent),
        })
    }

    /// Agent bound to one provider/model; fails before any call if either
    /// is unknown
    pub fn agent(&self, provider: &str, model: &str, max_steps: Option<usize>) -> agent_core::Result<Agent> {
        let mut config = self.agent.clone();
        if let Some(max_steps) = max_steps {
            config.max_steps = max_steps;
        }

        AgentBuilder::new(Arc::clone(&self.router))
            .tools(Arc::clone(&self.tools))
            .prompts(Arc::clone(&self.prompts))
            .provider(provider)
            .model(model)
            .config(config)
            .build()
    }
}
