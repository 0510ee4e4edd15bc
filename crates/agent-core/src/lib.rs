//! # agent-core
//!
//! Provider-agnostic chat routing and a bounded, tool-using agent loop.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                           Agent                               │
//! │  ┌─────────────┐   ┌─────────────┐   ┌────────────────────┐  │
//! │  │  Reasoning  │   │    Tool     │   │     ChatRouter     │  │
//! │  │    Loop     │───│  Registry   │   │  (ModelRegistry)   │  │
//! │  └──────┬──────┘   └─────────────┘   └─────────┬──────────┘  │
//! │         └──────────────────────────────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//!                                                  │
//!                                        dyn ChatProvider
//! ```
//!
//! The `ChatProvider` trait lets OpenAI-compatible, Anthropic, and Ollama
//! adapters sit behind the same router. Adapters and concrete tools live in
//! `agent-runtime`; this crate holds the contracts and the loop.

pub mod config;
pub mod error;
pub mod message;
pub mod parse;
pub mod prompts;
pub mod provider;
pub mod reasoning;
pub mod registry;
pub mod router;
pub mod session;
pub mod tool;

#[cfg(test)]
mod testing;

pub use config::{AppConfig, ConfigError};
pub use error::{AgentError, ErrorKind, Result, ToolError};
pub use message::{ChatMessage, Role, Transcript};
pub use parse::{parse_reply, ModelReply};
pub use prompts::PromptConfig;
pub use provider::{ChatProvider, ChatResponse, FinishReason, TokenUsage};
pub use reasoning::{Agent, AgentBuilder, AgentConfig, AgentOutcome, LoopState};
pub use registry::{ModelMetadata, ModelRegistry, ProviderHandle};
pub use router::ChatRouter;
pub use session::{AgentSession, SessionId, SessionStatus};
pub use tool::{Tool, ToolCallRequest, ToolInput, ToolInputExt, ToolRegistry, ToolResult, ToolSchema};
