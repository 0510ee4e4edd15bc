//! Tool Definitions
//!
//! Concrete tools and the registry builder. A tool that is absent or
//! disabled in configuration is never constructed, so it appears neither in
//! the registry nor in the prompt.

use agent_core::config::{ConfigError, ToolsConfig};
use agent_core::ToolRegistry;

pub mod files;
pub mod sandbox;
pub mod shell;
pub mod web;

pub use files::{ReadFileTool, WriteFileTool};
pub use sandbox::Sandbox;
pub use shell::ShellTool;
pub use web::{WebFetchTool, WebSearchTool};

/// Construct every enabled tool
pub fn build_tool_registry(config: &ToolsConfig) -> Result<ToolRegistry, ConfigError> {
    let mut registry = ToolRegistry::new();

    if let Some(cfg) = config.shell.as_ref().filter(|c| c.enabled) {
        let tool = ShellTool::new(cfg).map_err(|e| {
            setup_error("shell", format!("working_dir {}: {e}", cfg.working_dir.display()))
        })?;
        registry.register(tool);
    }

    if let Some(cfg) = config.read_file.as_ref().filter(|c| c.enabled) {
        let tool = ReadFileTool::new(cfg)
            .map_err(|e| setup_error("read_file", format!("root_dir {}: {e}", cfg.root_dir.display())))?;
        registry.register(tool);
    }

    if let Some(cfg) = config.write_file.as_ref().filter(|c| c.enabled) {
        let tool = WriteFileTool::new(cfg)
            .map_err(|e| setup_error("write_file", format!("root_dir {}: {e}", cfg.root_dir.display())))?;
        registry.register(tool);
    }

    if let Some(cfg) = config.web_search.as_ref().filter(|c| c.enabled) {
        if let Some(tool) = WebSearchTool::from_config(cfg).map_err(|e| setup_error("web_search", e))? {
            registry.register(tool);
        }
    }

    if let Some(cfg) = config.web_fetch.as_ref().filter(|c| c.enabled) {
        registry.register(WebFetchTool::new(cfg).map_err(|e| setup_error("web_fetch", e))?);
    }

    tracing::debug!(tools = ?registry.names(), "Tool registry ready");
    Ok(registry)
}

fn setup_error(tool: &str, detail: String) -> ConfigError {
    ConfigError::Validation(format!("cannot set up tool `{tool}`: {detail}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::config::{FileToolConfig, ShellToolConfig, WebFetchConfig, WebSearchConfig};

    #[test]
    fn test_only_enabled_tools_are_registered() {
        let dir = tempfile::tempdir().unwrap();
        let config = ToolsConfig {
            shell: Some(ShellToolConfig {
                enabled: true,
                working_dir: dir.path().join("shell"),
                ..ShellToolConfig::default()
            }),
            read_file: Some(FileToolConfig {
                enabled: true,
                root_dir: dir.path().join("files"),
                ..FileToolConfig::default()
            }),
            write_file: Some(FileToolConfig {
                enabled: false,
                root_dir: dir.path().join("files"),
                ..FileToolConfig::default()
            }),
            web_search: Some(WebSearchConfig {
                enabled: true,
                endpoint: Some("https://search.example.com".into()),
                api_key_env: Some("AGENT_RUNTIME_TEST_SEARCH_KEY_NOT_SET".into()),
                ..WebSearchConfig::default()
            }),
            web_fetch: Some(WebFetchConfig::default()),
            ..ToolsConfig::default()
        };

        let registry = build_tool_registry(&config).unwrap();
        assert_eq!(registry.names(), vec!["shell_command", "read_file"]);

        let described = registry.describe();
        assert!(described.contains("shell_command"));
        assert!(!described.contains("write_file"));
        assert!(!described.contains("web_search"));
        assert!(dir.path().join("shell").is_dir());
    }

    #[test]
    fn test_empty_config_has_no_tools() {
        let registry = build_tool_registry(&ToolsConfig::default()).unwrap();
        assert!(registry.is_empty());
        assert!(registry.describe().is_empty());
    }
}
