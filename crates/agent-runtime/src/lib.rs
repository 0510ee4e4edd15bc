//! # agent-runtime
//!
//! Concrete chat adapters and tools behind the `agent-core` contracts.
//!
//! ## Providers
//!
//! - **OpenAI** and **Perplexity**: OpenAI-compatible `chat/completions`
//! - **Anthropic**: Messages API
//! - **Ollama** (default feature): local inference via `ollama-rs`
//!
//! ## Tools
//!
//! `shell_command`, `read_file`, `write_file`, `web_search`, `web_fetch`.
//! File tools are confined to their root directory; the shell tool runs in
//! its working directory behind an allow-list.
//!
//! ## Usage
//!
//! ```rust,ignore
//! let config = AppConfig::load("config.yaml")?;
//! let registry = agent_runtime::build_model_registry(&config)?;
//! let tools = agent_runtime::build_tool_registry(&config.tools)?;
//! let router = ChatRouter::with_concurrency(Arc::new(registry), config.agent.max_concurrent_calls);
//! ```

pub mod providers;
pub mod tools;

pub use providers::{build_model_registry, Credentials};
pub use tools::build_tool_registry;

// Re-export core types for convenience
pub use agent_core::{
    Agent, AgentBuilder, AgentError, AppConfig, ChatProvider, ChatRouter, ModelRegistry, Result,
    Tool, ToolRegistry,
};
