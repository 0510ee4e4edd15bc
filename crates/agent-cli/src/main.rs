//! agentctl
//!
//! Command-line front end: tool-free questions, single agent tasks, and an
//! interactive chat loop over any configured provider.

mod commands;
mod state;

use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand, ValueEnum};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use agent_core::AppConfig;

use crate::state::AppState;

#[derive(Parser)]
#[command(name = "agentctl")]
#[command(about = "Chat with any configured model, or let it use tools to finish a task")]
#[command(version)]
struct Cli {
    /// Configuration file (YAML, or TOML by extension)
    #[arg(short, long, global = true, default_value = "config.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ask one question, no tools
    Ask {
        #[command(flatten)]
        target: Target,

        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,
    },
    /// Run one task with tools
    Agent {
        #[command(flatten)]
        target: Target,

        /// Override agent.max_steps
        #[arg(long)]
        max_steps: Option<usize>,

        #[arg(required = true, num_args = 1..)]
        task: Vec<String>,
    },
    /// Interactive session
    Chat {
        #[arg(long, value_enum, default_value_t = Mode::Ask)]
        mode: Mode,

        #[command(flatten)]
        target: Target,

        /// Override agent.max_steps
        #[arg(long)]
        max_steps: Option<usize>,
    },
}

#[derive(Args)]
pub struct Target {
    /// Provider name from the configuration
    #[arg(short, long)]
    pub provider: String,

    /// Model key under that provider
    #[arg(short, long)]
    pub model: String,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum Mode {
    Ask,
    Agent,
}

impl std::fmt::Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Ask => f.write_str("ask"),
            Self::Agent => f.write_str("agent"),
        }
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Cancel in-flight work on Ctrl-C
fn cancel_on_interrupt() -> CancellationToken {
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted");
            trigger.cancel();
        }
    });
    cancel
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let config = AppConfig::load(&cli.config)
        .with_context(|| format!("cannot load configuration from {}", cli.config.display()))?;

    init_tracing(&config.logging.level);

    let state = AppState::from_config(&config)?;
    let cancel = cancel_on_interrupt();

    match cli.command {
        Command::Ask { target, question } => {
            commands::ask(&state, &target, &question.join(" "), &cancel).await
        }
        Command::Agent {
            target,
            max_steps,
            task,
        } => commands::run_task(&state, &target, max_steps, &task.join(" "), &cancel).await,
        Command::Chat {
            mode,
            target,
            max_steps,
        } => commands::chat(&state, mode, &target, max_steps, &cancel).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_agent_command() {
        let cli = Cli::try_parse_from([
            "agentctl", "agent", "-p", "openai", "-m", "gpt4o", "--max-steps", "2", "--", "run", "free", "-h",
        ])
        .unwrap();
        assert_eq!(cli.config, PathBuf::from("config.yaml"));
        match cli.command {
            Command::Agent { target, max_steps, task } => {
                assert_eq!(target.provider, "openai");
                assert_eq!(max_steps, Some(2));
                assert_eq!(task.join(" "), "run free -h");
            }
            _ => panic!("expected agent command"),
        }
    }

    #[test]
    fn test_parse_chat_mode() {
        let cli = Cli::try_parse_from(["agentctl", "chat", "--mode", "agent", "-p", "anthropic", "-m", "sonnet"]).unwrap();
        assert!(matches!(cli.command, Command::Chat { mode: Mode::Agent, .. }));
    }
}
