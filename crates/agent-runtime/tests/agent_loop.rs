//! End-to-end agent runs with real tools and a scripted model.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use agent_core::config::{FileToolConfig, ProviderKind, ShellToolConfig, ToolsConfig};
use agent_core::provider::{ChatProvider, ChatResponse};
use agent_core::registry::{ModelMetadata, ModelRegistry, ProviderHandle};
use agent_core::{AgentBuilder, AgentError, ChatMessage, ChatRouter, Role, SessionStatus};
use agent_runtime::build_tool_registry;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

struct ScriptedModel {
    replies: Mutex<VecDeque<String>>,
}

impl ScriptedModel {
    fn new(replies: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(replies.iter().map(|r| (*r).to_string()).collect()),
        })
    }
}

#[async_trait]
impl ChatProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn chat(&self, model: &str, _messages: &[ChatMessage], _stream: bool) -> agent_core::Result<ChatResponse> {
        let reply = self
            .replies
            .lock()
            .unwrap()
            .pop_front()
            .ok_or_else(|| AgentError::provider(None, "script exhausted"))?;
        Ok(ChatResponse::text(model, reply))
    }
}

fn router(model: Arc<ScriptedModel>) -> Arc<ChatRouter> {
    let handle = ProviderHandle {
        name: "scripted".into(),
        kind: ProviderKind::OpenAi,
        enabled: true,
        base_url: "http://localhost:0".into(),
        api_key_env: None,
        models: [(
            "default".to_string(),
            ModelMetadata {
                name: "scripted-1".into(),
                supports_tools: false,
                supports_stream: false,
                max_context_tokens: 8192,
            },
        )]
        .into_iter()
        .collect(),
    };
    let registry = ModelRegistry::builder().provider(handle, model).build();
    Arc::new(ChatRouter::new(Arc::new(registry)))
}

fn tools(dir: &tempfile::TempDir) -> ToolsConfig {
    ToolsConfig {
        shell: Some(ShellToolConfig {
            enabled: true,
            working_dir: dir.path().join("workspace"),
            allowed_commands: vec!["ls".into(), "echo".into()],
            ..ShellToolConfig::default()
        }),
        read_file: Some(FileToolConfig {
            enabled: true,
            root_dir: dir.path().join("workspace"),
            ..FileToolConfig::default()
        }),
        write_file: Some(FileToolConfig {
            enabled: true,
            root_dir: dir.path().join("workspace"),
            ..FileToolConfig::default()
        }),
        ..ToolsConfig::default()
    }
}

#[cfg(unix)]
#[tokio::test]
async fn shell_call_then_final_answer() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&[
        r#"{"tool": "shell_command", "tool_input": {"command": "echo 2G free"}}"#,
        r#"{"tool": null, "final_answer": "2G free"}"#,
    ]);
    let agent = AgentBuilder::new(router(model))
        .tools(Arc::new(build_tool_registry(&tools(&dir)).unwrap()))
        .provider("scripted")
        .model("default")
        .max_steps(4)
        .build()
        .unwrap();

    let outcome = agent.run_task("how much memory is free?", &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, SessionStatus::FinalAnswer);
    assert_eq!(outcome.answer, "2G free");
    assert_eq!(outcome.transcript.count(Role::ToolResult), 1);
    let tool_msg = &outcome.transcript.messages()[3];
    assert_eq!(
        tool_msg.content,
        "Result from tool 'shell_command' with input {\"command\":\"echo 2G free\"}:\nSTDOUT:\n2G free\n\nReturn code: 0"
    );
}

#[tokio::test]
async fn escaping_write_is_reported_and_nothing_is_written() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&[
        r#"{"tool": "write_file", "tool_input": {"path": "../escape.txt", "content": "x"}}"#,
        r#"{"tool": null, "final_answer": "I could not write outside the workspace."}"#,
    ]);
    let agent = AgentBuilder::new(router(model))
        .tools(Arc::new(build_tool_registry(&tools(&dir)).unwrap()))
        .provider("scripted")
        .model("default")
        .build()
        .unwrap();

    let outcome = agent.run_task("write a file", &CancellationToken::new()).await.unwrap();

    assert_eq!(outcome.status, SessionStatus::FinalAnswer);
    assert!(!dir.path().join("escape.txt").exists());
    let tool_msg = &outcome.transcript.messages()[3];
    assert_eq!(tool_msg.role, Role::ToolResult);
    assert!(tool_msg.content.starts_with("Tool 'write_file' failed with input"));
    assert!(tool_msg.content.contains("outside the sandbox root"));
}

#[cfg(unix)]
#[tokio::test]
async fn symlink_out_of_root_is_not_followed() {
    let dir = tempfile::tempdir().unwrap();
    let outside = dir.path().join("outside");
    std::fs::create_dir(&outside).unwrap();
    std::fs::write(outside.join("secret.txt"), "s3cret").unwrap();

    let registry = build_tool_registry(&tools(&dir)).unwrap();
    std::os::unix::fs::symlink(&outside, dir.path().join("workspace/link")).unwrap();

    let model = ScriptedModel::new(&[
        r#"{"tool": "read_file", "tool_input": {"path": "link/secret.txt"}}"#,
        r#"{"tool": null, "final_answer": "denied"}"#,
    ]);
    let agent = AgentBuilder::new(router(model))
        .tools(Arc::new(registry))
        .provider("scripted")
        .model("default")
        .build()
        .unwrap();

    let outcome = agent.run_task("read the secret", &CancellationToken::new()).await.unwrap();
    let tool_msg = &outcome.transcript.messages()[3];
    assert!(!tool_msg.content.contains("s3cret"));
    assert!(tool_msg.content.contains("outside the sandbox root"));
}

#[tokio::test]
async fn disallowed_command_is_recoverable() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(&[
        r#"{"tool": "shell_command", "tool_input": {"command": "rm -rf ."}}"#,
        r#"{"tool": null, "final_answer": "rm is not permitted here."}"#,
    ]);
    let agent = AgentBuilder::new(router(model))
        .tools(Arc::new(build_tool_registry(&tools(&dir)).unwrap()))
        .provider("scripted")
        .model("default")
        .build()
        .unwrap();

    let outcome = agent.run_task("clean the workspace", &CancellationToken::new()).await.unwrap();
    assert_eq!(outcome.status, SessionStatus::FinalAnswer);
    assert!(outcome.transcript.messages()[3]
        .content
        .ends_with("command 'rm' is not allowed"));
    assert!(dir.path().join("workspace").is_dir());
}
