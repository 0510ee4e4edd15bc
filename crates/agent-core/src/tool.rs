//! Tool System
//!
//! Sandboxed capabilities the model may invoke. Tools are registered at
//! start-up from configuration and invoked by the agent loop. Only registered
//! tools are described to the model.

use async_trait::async_trait;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::error::ToolError;
use crate::message::ChatMessage;

/// Tool-specific input, exactly as the model sent it
pub type ToolInput = serde_json::Map<String, Value>;

/// Tool call request parsed from model output
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    /// Tool identifier
    pub name: String,

    /// Arguments as key-value pairs
    pub input: ToolInput,
}

impl ToolCallRequest {
    pub fn new(name: impl Into<String>, input: ToolInput) -> Self {
        Self {
            name: name.into(),
            input,
        }
    }
}

/// Outcome of one tool call
#[derive(Clone, Debug)]
pub struct ToolResult {
    /// Tool that was called
    pub name: String,

    /// Input it was called with
    pub input: ToolInput,

    /// Output text or the reason it failed
    pub outcome: Result<String, ToolError>,
}

impl ToolResult {
    pub fn success(call: &ToolCallRequest, output: impl Into<String>) -> Self {
        Self {
            name: call.name.clone(),
            input: call.input.clone(),
            outcome: Ok(output.into()),
        }
    }

    pub fn failure(call: &ToolCallRequest, error: ToolError) -> Self {
        Self {
            name: call.name.clone(),
            input: call.input.clone(),
            outcome: Err(error),
        }
    }

    pub const fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    /// Format for the transcript
    pub fn to_message(&self) -> ChatMessage {
        let input = Value::Object(self.input.clone());
        let content = match &self.outcome {
            Ok(output) => format!(
                "Result from tool '{}' with input {input}:\n{output}",
                self.name
            ),
            Err(e) => format!("Tool '{}' failed with input {input}: {e}", self.name),
        };
        ChatMessage::tool_result(&self.name, content)
    }
}

/// Parameter definition for tool schema
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ParameterSchema {
    /// Parameter name
    pub name: String,

    /// JSON type (string, integer, boolean, ...)
    #[serde(rename = "type")]
    pub param_type: String,

    /// Human-readable description
    pub description: String,

    /// Whether this parameter is required
    #[serde(default)]
    pub required: bool,
}

impl ParameterSchema {
    pub fn required(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            description: description.into(),
            required: true,
        }
    }

    pub fn optional(name: &str, param_type: &str, description: &str) -> Self {
        Self {
            required: false,
            ..Self::required(name, param_type, description)
        }
    }
}

/// Tool definition shown to the model
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolSchema {
    /// Unique tool identifier
    pub name: String,

    /// Human-readable description (shown to the model)
    pub description: String,

    /// Parameter definitions
    pub parameters: Vec<ParameterSchema>,
}

/// Tool trait - implement to add new capabilities
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the tool's schema
    fn schema(&self) -> ToolSchema;

    /// Execute the tool with the given input
    async fn run(&self, input: &ToolInput) -> Result<String, ToolError>;

    /// Validate input before execution
    fn validate(&self, input: &ToolInput) -> Result<(), ToolError> {
        let schema = self.schema();

        for param in &schema.parameters {
            if param.required && input.get(&param.name).is_none_or(Value::is_null) {
                return Err(ToolError::InvalidInput(format!(
                    "missing required parameter '{}'",
                    param.name
                )));
            }
        }

        Ok(())
    }
}

/// Typed accessors over a tool's input map
pub trait ToolInputExt {
    /// Required string argument
    fn str_arg(&self, key: &str) -> Result<&str, ToolError>;

    fn opt_str(&self, key: &str) -> Option<&str>;

    /// Non-negative integer, accepting numeric strings
    fn opt_u64(&self, key: &str) -> Result<Option<u64>, ToolError>;

    fn opt_bool(&self, key: &str) -> Result<Option<bool>, ToolError>;
}

impl ToolInputExt for ToolInput {
    fn str_arg(&self, key: &str) -> Result<&str, ToolError> {
        match self.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => Ok(s),
            Some(Value::String(_)) | None | Some(Value::Null) => Err(ToolError::InvalidInput(
                format!("'{key}' is required"),
            )),
            Some(other) => Err(ToolError::InvalidInput(format!(
                "'{key}' must be a string, got {other}"
            ))),
        }
    }

    fn opt_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    fn opt_u64(&self, key: &str) -> Result<Option<u64>, ToolError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Number(n)) => n.as_u64().map(Some).ok_or_else(|| {
                ToolError::InvalidInput(format!("'{key}' must be a non-negative integer"))
            }),
            Some(Value::String(s)) => s.trim().parse().map(Some).map_err(|_| {
                ToolError::InvalidInput(format!("'{key}' must be a non-negative integer"))
            }),
            Some(other) => Err(ToolError::InvalidInput(format!(
                "'{key}' must be an integer, got {other}"
            ))),
        }
    }

    fn opt_bool(&self, key: &str) -> Result<Option<bool>, ToolError> {
        match self.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) => match s.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(Some(true)),
                "false" => Ok(Some(false)),
                _ => Err(ToolError::InvalidInput(format!("'{key}' must be a boolean"))),
            },
            Some(other) => Err(ToolError::InvalidInput(format!(
                "'{key}' must be a boolean, got {other}"
            ))),
        }
    }
}

/// Registry for available tools
#[derive(Default)]
pub struct ToolRegistry {
    tools: IndexMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool
    pub fn register<T: Tool + 'static>(&mut self, tool: T) {
        self.register_arc(Arc::new(tool));
    }

    /// Register a shared tool
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let schema = tool.schema();
        tracing::debug!(tool = %schema.name, "Registered tool");
        self.tools.insert(schema.name, tool);
    }

    /// Get a tool by name
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    /// Validate and run a call. Never fails: every problem becomes a
    /// `ToolResult` failure.
    pub async fn execute(&self, call: &ToolCallRequest) -> ToolResult {
        let Some(tool) = self.get(&call.name) else {
            return ToolResult::failure(call, ToolError::UnknownTool(call.name.clone()));
        };
        run_tool(tool.as_ref(), call).await
    }

    /// Tool names in registration order
    pub fn names(&self) -> Vec<&str> {
        self.tools.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// One line per registered tool, for the agent system prompt
    pub fn describe(&self) -> String {
        self.tools
            .values()
            .map(|tool| describe_schema(&tool.schema()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// Validate, then run
pub async fn run_tool(tool: &dyn Tool, call: &ToolCallRequest) -> ToolResult {
    if let Err(e) = tool.validate(&call.input) {
        return ToolResult::failure(call, e);
    }
    match tool.run(&call.input).await {
        Ok(output) => ToolResult::success(call, output),
        Err(e) => ToolResult::failure(call, e),
    }
}

fn describe_schema(schema: &ToolSchema) -> String {
    let mut line = format!("- {}: {}", schema.name, schema.description);
    if !schema.parameters.is_empty() {
        let params: Vec<String> = schema
            .parameters
            .iter()
            .map(|p| {
                let required = if p.required { ", required" } else { "" };
                format!("\"{}\" ({}{}): {}", p.name, p.param_type, required, p.description)
            })
            .collect();
        line.push_str(" Input: ");
        line.push_str(&params.join("; "));
    }
    line
}
