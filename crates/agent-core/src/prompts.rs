//! System prompts for the two operating modes.

use serde::{Deserialize, Serialize};

pub const DEFAULT_ASK_SYSTEM: &str = "You are a helpful assistant. Answer the user's question clearly and \
concisely. Do not claim to execute actions or tools in this mode.";

pub const DEFAULT_AGENT_SYSTEM: &str = r#"You are a tool-using AI agent. You may only call the tools listed under "Available tools" below.

You must always respond in JSON ONLY, with one of the following forms:

1) To call a tool:
{
  "tool": "tool_name",
  "tool_input": { ... }
}

2) To provide a final answer (no more tool calls):
{
  "tool": null,
  "final_answer": "..."
}

Call at most one tool per reply. Never include any non-JSON text in your response. Tool names and input must match the descriptions you are given."#;

/// Prompt strings, configurable under `prompts:`
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptConfig {
    /// System prompt for tool-free ask mode
    pub ask_system: String,

    /// System prompt for agent mode; the tool list is appended to it
    pub agent_system: String,
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            ask_system: DEFAULT_ASK_SYSTEM.into(),
            agent_system: DEFAULT_AGENT_SYSTEM.into(),
        }
    }
}

impl PromptConfig {
    /// Agent system prompt followed by the description of every usable tool
    pub fn agent_prompt(&self, tool_descriptions: &str) -> String {
        let mut prompt = self.agent_system.clone();
        prompt.push_str("\n\nAvailable tools:\n");
        if tool_descriptions.is_empty() {
            prompt.push_str("(none)");
        } else {
            prompt.push_str(tool_descriptions);
        }
        prompt
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_agent_prompt_appends_tools() {
        let prompts = PromptConfig::default();
        let prompt = prompts.agent_prompt("- read_file: Read a file");
        assert!(prompt.starts_with(DEFAULT_AGENT_SYSTEM));
        assert!(prompt.ends_with("Available tools:\n- read_file: Read a file"));
    }

    #[test]
    fn test_default_prompt_names_no_capabilities() {
        let prompt = PromptConfig::default().agent_prompt("- read_file: Read a file");
        for capability in ["web", "browse", "command", "shell"] {
            assert!(!prompt.to_lowercase().contains(capability), "{capability}");
        }
    }

    #[test]
    fn test_agent_prompt_without_tools() {
        let prompt = PromptConfig::default().agent_prompt("");
        assert!(prompt.ends_with("(none)"));
    }
}
