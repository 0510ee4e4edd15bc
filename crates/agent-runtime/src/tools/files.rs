//! File tools confined to a workspace root.

use agent_core::config::FileToolConfig;
use agent_core::tool::{ParameterSchema, Tool, ToolInput, ToolInputExt, ToolSchema};
use agent_core::ToolError;
use async_trait::async_trait;

use super::sandbox::Sandbox;

/// Reads a text file under the root, up to `max_chars` characters
pub struct ReadFileTool {
    sandbox: Sandbox,
    max_chars: usize,
}

impl ReadFileTool {
    pub fn new(config: &FileToolConfig) -> std::io::Result<Self> {
        Ok(Self {
            sandbox: Sandbox::new(&config.root_dir)?,
            max_chars: config.max_chars,
        })
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "read_file".into(),
            description: "Read a text file from the workspace directory.".into(),
            parameters: vec![
                ParameterSchema::required("path", "string", "path relative to the workspace"),
                ParameterSchema::optional("max_chars", "integer", "maximum characters to return"),
            ],
        }
    }

    async fn run(&self, input: &ToolInput) -> Result<String, ToolError> {
        let path = input.str_arg("path")?;
        let max_chars = input
            .opt_u64("max_chars")?
            .map_or(self.max_chars, |n| usize::try_from(n).unwrap_or(usize::MAX));

        let resolved = self.sandbox.resolve(path)?;
        let content = tokio::fs::read_to_string(&resolved)
            .await
            .map_err(|e| ToolError::Io(format!("cannot read '{path}': {e}")))?;

        Ok(content.chars().take(max_chars).collect())
    }
}

/// Writes a text file under the root, creating parent directories
pub struct WriteFileTool {
    sandbox: Sandbox,
}

impl WriteFileTool {
    pub fn new(config: &FileToolConfig) -> std::io::Result<Self> {
        Ok(Self {
            sandbox: Sandbox::new(&config.root_dir)?,
        })
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "write_file".into(),
            description: "Write text content to a file in the workspace directory.".into(),
            parameters: vec![
                ParameterSchema::required("path", "string", "path relative to the workspace"),
                ParameterSchema::required("content", "string", "text to write"),
                ParameterSchema::optional("overwrite", "boolean", "replace an existing file (default true)"),
            ],
        }
    }

    async fn run(&self, input: &ToolInput) -> Result<String, ToolError> {
        let path = input.str_arg("path")?;
        let content = input
            .opt_str("content")
            .ok_or_else(|| ToolError::InvalidInput("'content' must be a string".into()))?;
        let overwrite = input.opt_bool("overwrite")?.unwrap_or(true);

        let resolved = self.sandbox.resolve(path)?;

        if !overwrite && tokio::fs::try_exists(&resolved).await? {
            return Err(ToolError::Io(format!(
                "'{path}' already exists and overwrite is false"
            )));
        }
        if let Some(parent) = resolved.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&resolved, content)
            .await
            .map_err(|e| ToolError::Io(format!("cannot write '{path}': {e}")))?;

        tracing::debug!(path, bytes = content.len(), "Wrote file");
        Ok(format!("wrote {} bytes to '{path}'", content.len()))
    }
}
