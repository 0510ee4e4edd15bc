//! Command handlers
//!
//! Answers go to stdout; prompts, notices, and errors go to stderr.

use std::io::Write;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

use agent_core::{AgentError, SessionStatus};

use crate::state::AppState;
use crate::{Mode, Target};

/// Tool-free question
pub async fn ask(state: &AppState, target: &Target, question: &str, cancel: &CancellationToken) -> anyhow::Result<()> {
    let agent = state
        .agent(&target.provider, &target.model, None)
        .map_err(report)?;
    let answer = agent.ask(question, cancel).await.map_err(report)?;
    println!("{answer}");
    Ok(())
}

/// One tool-using task
pub async fn run_task(
    state: &AppState,
    target: &Target,
    max_steps: Option<usize>,
    task: &str,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let agent = state
        .agent(&target.provider, &target.model, max_steps)
        .map_err(report)?;
    let outcome = agent.run_task(task, cancel).await.map_err(report)?;

    if outcome.status == SessionStatus::StepLimitExceeded {
        tracing::warn!(steps = outcome.steps, "Stopped at the step limit");
    }
    println!("{}", outcome.answer);
    Ok(())
}

/// Interactive loop; each line is an independent request
pub async fn chat(
    state: &AppState,
    mode: Mode,
    target: &Target,
    max_steps: Option<usize>,
    cancel: &CancellationToken,
) -> anyhow::Result<()> {
    let agent = state
        .agent(&target.provider, &target.model, max_steps)
        .map_err(report)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    eprintln!(
        "Chatting with {}/{} in {mode} mode. Type /exit to quit.",
        target.provider, target.model
    );

    loop {
        eprint!("> ");
        std::io::stderr().flush().ok();

        let line = tokio::select! {
            () = cancel.cancelled() => break,
            line = lines.next_line() => line?,
        };
        let Some(line) = line else { break };

        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        if matches!(input, "/exit" | "/quit") {
            break;
        }

        let result = match mode {
            Mode::Ask => agent.ask(input, cancel).await,
            Mode::Agent => agent.run_task(input, cancel).await.map(|outcome| outcome.answer),
        };

        match result {
            Ok(answer) => println!("{answer}\n"),
            Err(AgentError::Cancelled(_)) => break,
            Err(e) => {
                tracing::debug!(error = %e, "Turn failed");
                eprintln!("Error: {}", e.user_message());
            }
        }
    }

    eprintln!("Bye.");
    Ok(())
}

fn report(err: AgentError) -> anyhow::Error {
    let message = err.user_message();
    anyhow::Error::new(err).context(message)
}
