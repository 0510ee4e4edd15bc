//! Shell command tool
//!
//! Runs `sh -c <command>` in the configured working directory. When the
//! allow-list is non-empty, the first whitespace-delimited token of the
//! command must match an entry exactly; the check happens before anything is
//! spawned. The command runs in its own process group, and the whole group
//! is killed when the timeout expires or the run is cancelled.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use agent_core::config::ShellToolConfig;
use agent_core::tool::{ParameterSchema, Tool, ToolInput, ToolInputExt, ToolSchema};
use agent_core::ToolError;
use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};

pub struct ShellTool {
    working_dir: PathBuf,
    allowed_commands: Vec<String>,
    timeout: Duration,
    max_output_bytes: usize,
}

impl ShellTool {
    pub fn new(config: &ShellToolConfig) -> std::io::Result<Self> {
        std::fs::create_dir_all(&config.working_dir)?;
        Ok(Self {
            working_dir: config.working_dir.canonicalize()?,
            allowed_commands: config.allowed_commands.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            max_output_bytes: config.max_output_bytes,
        })
    }

    fn check_allowed(&self, command: &str) -> Result<(), ToolError> {
        let program = command
            .split_whitespace()
            .next()
            .ok_or_else(|| ToolError::InvalidInput("'command' is empty".into()))?;

        if self.allowed_commands.is_empty() || self.allowed_commands.iter().any(|c| c == program) {
            Ok(())
        } else {
            Err(ToolError::CommandNotAllowed(program.to_string()))
        }
    }

    /// The model may shorten the timeout, never extend it
    fn effective_timeout(&self, requested_secs: Option<u64>) -> Duration {
        requested_secs.map_or(self.timeout, |secs| self.timeout.min(Duration::from_secs(secs)))
    }

    fn capture(&self, bytes: &[u8]) -> String {
        let capped = &bytes[..bytes.len().min(self.max_output_bytes)];
        let mut text = String::from_utf8_lossy(capped).into_owned();
        if bytes.len() > self.max_output_bytes {
            text.push_str("\n...[truncated]...");
        }
        text
    }
}

#[async_trait]
impl Tool for ShellTool {
    fn schema(&self) -> ToolSchema {
        let description = if self.allowed_commands.is_empty() {
            "Execute a shell command in the workspace directory.".to_string()
        } else {
            format!(
                "Execute a shell command in the workspace directory. Allowed commands: {}.",
                self.allowed_commands.join(", ")
            )
        };
        ToolSchema {
            name: "shell_command".into(),
            description,
            parameters: vec![
                ParameterSchema::required("command", "string", "command line to run"),
                ParameterSchema::optional("timeout", "integer", "timeout in seconds"),
            ],
        }
    }

    async fn run(&self, input: &ToolInput) -> Result<String, ToolError> {
        let command = input.str_arg("command")?;
        self.check_allowed(command)?;
        let timeout = self.effective_timeout(input.opt_u64("timeout")?);

        tracing::info!(command, ?timeout, "Running shell command");

        let mut command_line = Command::new("sh");
        command_line
            .arg("-c")
            .arg(command)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        #[cfg(unix)]
        command_line.process_group(0);

        let mut child = command_line.spawn()?;
        // Declared after `child` so it is dropped first on cancellation
        let mut group = ProcessGroup::of(&child);

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let finished = tokio::time::timeout(timeout, async {
            tokio::try_join!(child.wait(), read_all(stdout), read_all(stderr))
        })
        .await;

        let Ok(finished) = finished else {
            tracing::warn!(command, ?timeout, "Shell command timed out; killing its process group");
            group.kill();
            child.kill().await.ok();
            return Err(ToolError::Timeout(timeout));
        };
        group.disarm();
        let (status, stdout, stderr) = finished?;
        let output = std::process::Output { status, stdout, stderr };

        let mut text = String::new();
        if !output.stdout.is_empty() {
            text.push_str("STDOUT:\n");
            text.push_str(&self.capture(&output.stdout));
            text.push('\n');
        }
        if !output.stderr.is_empty() {
            text.push_str("STDERR:\n");
            text.push_str(&self.capture(&output.stderr));
            text.push('\n');
        }
        let code = output
            .status
            .code()
            .map_or_else(|| "terminated by signal".to_string(), |c| c.to_string());
        text.push_str("Return code: ");
        text.push_str(&code);
        Ok(text)
    }
}

async fn read_all(pipe: Option<impl AsyncRead + Unpin>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// Kills the child's process group when dropped, unless disarmed
struct ProcessGroup {
    #[cfg(unix)]
    leader: Option<nix::unistd::Pid>,
}

impl ProcessGroup {
    #[cfg(unix)]
    fn of(child: &Child) -> Self {
        Self {
            leader: child
                .id()
                .and_then(|id| i32::try_from(id).ok())
                .map(nix::unistd::Pid::from_raw),
        }
    }

    #[cfg(not(unix))]
    fn of(_child: &Child) -> Self {
        Self {}
    }

    /// The leader has been reaped; its id may be reused
    fn disarm(&mut self) {
        #[cfg(unix)]
        {
            self.leader = None;
        }
    }

    fn kill(&mut self) {
        #[cfg(unix)]
        if let Some(leader) = self.leader.take() {
            if let Err(e) = nix::sys::signal::killpg(leader, nix::sys::signal::Signal::SIGKILL) {
                tracing::debug!(pgid = %leader, error = %e, "killpg failed");
            }
        }
    }
}

impl Drop for ProcessGroup {
    fn drop(&mut self) {
        self.kill();
    }
}
