//! Reasoning Loop
//!
//! Drives one session as an explicit, counted state machine:
//!
//! ```text
//! Init -> AwaitingModel -> ParsingResponse -> ExecutingTool -> AwaitingModel ...
//!                                |                  |
//!                                v                  v
//!                        Terminated(final)   Terminated(step limit)
//! ```
//!
//! Any provider failure moves the session to its error status and is
//! returned to the caller. Tool failures are written into the transcript for
//! the model to react to. Exactly one provider call or one tool run is
//! outstanding at a time, and both race against the caller's cancellation
//! token.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::{AgentSettings, ConfigError, MalformedReplyPolicy, RetryPolicy};
use crate::error::{AgentError, Result};
use crate::message::{ChatMessage, Transcript};
use crate::parse::{looks_like_json, parse_reply, ModelReply};
use crate::prompts::PromptConfig;
use crate::provider::ChatResponse;
use crate::router::ChatRouter;
use crate::session::{AgentSession, SessionId, SessionStatus};
use crate::tool::{ToolCallRequest, ToolRegistry};

/// Answer returned when the step bound ends a session
pub const STEP_LIMIT_ANSWER: &str = "Maximum tool-calling steps reached without a final answer.";

const JSON_REMINDER: &str = "Your previous message was not valid JSON. You MUST respond with JSON \
ONLY as described in the system prompt. Do not include any extra text.";

/// Agent configuration
#[derive(Clone, Debug)]
pub struct AgentConfig {
    /// Maximum tool executions per session
    pub max_steps: usize,

    /// Ask for streamed responses where the model supports it
    pub stream: bool,

    /// Budget for a single provider call
    pub provider_timeout: Duration,

    pub retry: RetryPolicy,

    pub malformed_reply: MalformedReplyPolicy,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self::from(&AgentSettings::default())
    }
}

impl From<&AgentSettings> for AgentConfig {
    fn from(settings: &AgentSettings) -> Self {
        Self {
            max_steps: settings.max_steps,
            stream: settings.stream,
            provider_timeout: Duration::from_secs(settings.provider_timeout_secs),
            retry: settings.retry.clone(),
            malformed_reply: settings.malformed_reply.clone(),
        }
    }
}

/// Result of a finished session
#[derive(Clone, Debug)]
pub struct AgentOutcome {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub answer: String,
    pub transcript: Transcript,
    /// Tool executions performed
    pub steps: usize,
}

/// Position in the loop
#[derive(Clone, Debug, PartialEq)]
pub enum LoopState {
    AwaitingModel,
    ParsingResponse(String),
    ExecutingTool(ToolCallRequest),
    Terminated(String),
}

/// The main Agent struct
pub struct Agent {
    router: Arc<ChatRouter>,
    tools: Arc<ToolRegistry>,
    prompts: Arc<PromptConfig>,
    provider: String,
    model: String,
    context_tokens: u32,
    config: AgentConfig,
}

impl Agent {
    /// Create an agent bound to one provider/model pair.
    ///
    /// Fails with `UnknownProvider`/`UnknownModel` before any session exists.
    pub fn new(
        router: Arc<ChatRouter>,
        tools: Arc<ToolRegistry>,
        prompts: Arc<PromptConfig>,
        provider: impl Into<String>,
        model: impl Into<String>,
        config: AgentConfig,
    ) -> Result<Self> {
        let provider = provider.into();
        let model = model.into();
        let context_tokens = router.validate(&provider, &model)?.max_context_tokens;

        Ok(Self {
            router,
            tools,
            prompts,
            provider,
            model,
            context_tokens,
            config,
        })
    }

    /// System prompt for agent mode, listing every registered tool
    pub fn system_prompt(&self) -> String {
        self.prompts.agent_prompt(&self.tools.describe())
    }

    /// Tool-free mode: one model call, reply returned verbatim
    pub async fn ask(&self, question: &str, cancel: &CancellationToken) -> Result<String> {
        let transcript = Transcript::seeded(self.prompts.ask_system.clone(), question);
        let response = self.call_model(&transcript, cancel).await?;
        Ok(response.content)
    }

    /// Seed a new session for a task
    pub fn start_session(&self, task: &str) -> AgentSession {
        AgentSession::new(
            Transcript::seeded(self.system_prompt(), task),
            self.config.max_steps,
        )
    }

    /// Run a task to completion in a fresh session
    pub async fn run_task(&self, task: &str, cancel: &CancellationToken) -> Result<AgentOutcome> {
        let mut session = self.start_session(task);
        self.run_session(&mut session, cancel).await
    }

    /// Drive a session until it terminates.
    ///
    /// On error the session is left in its error status with the
    /// transcript collected so far.
    pub async fn run_session(
        &self,
        session: &mut AgentSession,
        cancel: &CancellationToken,
    ) -> Result<AgentOutcome> {
        if !session.is_running() {
            return Err(AgentError::SessionTerminated(session.id.to_string()));
        }

        tracing::debug!(session = %session.id, max_steps = session.max_steps(), "Starting session");
        let mut state = LoopState::AwaitingModel;

        loop {
            state = match self.transition(session, state, cancel).await {
                Ok(LoopState::Terminated(answer)) => {
                    tracing::debug!(
                        session = %session.id,
                        status = ?session.status(),
                        steps = session.step(),
                        "Session finished"
                    );
                    return Ok(AgentOutcome {
                        session_id: session.id.clone(),
                        status: session.status().clone(),
                        answer,
                        transcript: session.transcript().clone(),
                        steps: session.step(),
                    });
                }
                Ok(next) => next,
                Err(e) => {
                    tracing::warn!(session = %session.id, error = %e, "Session failed");
                    session.finish(SessionStatus::from_error(&e));
                    return Err(e);
                }
            };
        }
    }

    /// Perform one state transition
    pub async fn transition(
        &self,
        session: &mut AgentSession,
        state: LoopState,
        cancel: &CancellationToken,
    ) -> Result<LoopState> {
        if cancel.is_cancelled() && !matches!(state, LoopState::Terminated(_)) {
            return Err(AgentError::Cancelled("interrupted between steps".into()));
        }

        match state {
            LoopState::AwaitingModel => {
                let response = self.call_model(session.transcript(), cancel).await?;
                session.push(ChatMessage::assistant(response.content.clone()).with_model(response.model));
                Ok(LoopState::ParsingResponse(response.content))
            }

            LoopState::ParsingResponse(content) => Ok(self.interpret(session, &content)),

            LoopState::ExecutingTool(call) => {
                tracing::info!(session = %session.id, tool = %call.name, step = session.step() + 1, "Executing tool");

                let result = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        return Err(AgentError::Cancelled(format!(
                            "interrupted while running tool '{}'",
                            call.name
                        )));
                    }
                    result = self.tools.execute(&call) => result,
                };

                if let Err(e) = &result.outcome {
                    tracing::info!(tool = %call.name, error = %e, "Tool failed; reporting to model");
                }
                session.push(result.to_message());
                session.advance_step();

                if session.steps_exhausted() {
                    Ok(self.hit_step_limit(session))
                } else {
                    Ok(LoopState::AwaitingModel)
                }
            }

            LoopState::Terminated(answer) => Ok(LoopState::Terminated(answer)),
        }
    }

    fn interpret(&self, session: &mut AgentSession, content: &str) -> LoopState {
        match parse_reply(content) {
            ModelReply::FinalAnswer(answer) => {
                session.finish(SessionStatus::FinalAnswer);
                LoopState::Terminated(answer)
            }
            ModelReply::ToolCall(call) => {
                if session.steps_exhausted() {
                    self.hit_step_limit(session)
                } else {
                    LoopState::ExecutingTool(call)
                }
            }
            ModelReply::PlainText(text) => {
                if let MalformedReplyPolicy::Reprompt { max_attempts } = self.config.malformed_reply {
                    if looks_like_json(&text) && session.reprompts < max_attempts {
                        session.reprompts += 1;
                        tracing::debug!(attempt = session.reprompts, "Malformed reply; asking for JSON again");
                        session.push(ChatMessage::user(JSON_REMINDER));
                        return LoopState::AwaitingModel;
                    }
                }
                session.finish(SessionStatus::FinalAnswer);
                LoopState::Terminated(text)
            }
        }
    }

    fn hit_step_limit(&self, session: &mut AgentSession) -> LoopState {
        tracing::info!(
            session = %session.id,
            max_steps = self.config.max_steps,
            "Step limit reached"
        );
        session.finish(SessionStatus::StepLimitExceeded);
        LoopState::Terminated(STEP_LIMIT_ANSWER.to_string())
    }

    /// One model call with timeout, cancellation, and the retry policy
    async fn call_model(&self, transcript: &Transcript, cancel: &CancellationToken) -> Result<ChatResponse> {
        let estimated = transcript.estimate_tokens();
        if estimated > self.context_tokens {
            tracing::warn!(
                estimated,
                limit = self.context_tokens,
                "Transcript may exceed the model context window"
            );
        }

        let mut attempt = 1;
        loop {
            let call = tokio::time::timeout(
                self.config.provider_timeout,
                self.router
                    .chat(&self.provider, &self.model, transcript.messages(), self.config.stream),
            );

            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    return Err(AgentError::Cancelled("interrupted while waiting for the model".into()));
                }
                result = call => result
                    .unwrap_or_else(|_| Err(AgentError::ProviderTimeout(self.config.provider_timeout))),
            };

            match result {
                Err(e) if e.is_retryable() && attempt < self.config.retry.max_attempts => {
                    let delay = self.config.retry.backoff(attempt);
                    tracing::warn!(attempt, ?delay, error = %e, "Provider call failed; retrying");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            return Err(AgentError::Cancelled("interrupted during retry backoff".into()));
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                other => return other,
            }
        }
    }

    /// Get the tool registry
    pub fn tools(&self) -> &ToolRegistry {
        &self.tools
    }

    /// Get configuration
    pub const fn config(&self) -> &AgentConfig {
        &self.config
    }
}

/// Builder for Agent configuration
pub struct AgentBuilder {
    router: Arc<ChatRouter>,
    tools: Arc<ToolRegistry>,
    prompts: Arc<PromptConfig>,
    provider: Option<String>,
    model: Option<String>,
    config: AgentConfig,
}

impl AgentBuilder {
    pub fn new(router: Arc<ChatRouter>) -> Self {
        Self {
            router,
            tools: Arc::new(ToolRegistry::new()),
            prompts: Arc::new(PromptConfig::default()),
            provider: None,
            model: None,
            config: AgentConfig::default(),
        }
    }

    #[must_use]
    pub fn tools(mut self, tools: Arc<ToolRegistry>) -> Self {
        self.tools = tools;
        self
    }

    #[must_use]
    pub fn prompts(mut self, prompts: Arc<PromptConfig>) -> Self {
        self.prompts = prompts;
        self
    }

    #[must_use]
    pub fn provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = Some(provider.into());
        self
    }

    #[must_use]
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub const fn max_steps(mut self, max: usize) -> Self {
        self.config.max_steps = max;
        self
    }

    pub fn build(self) -> Result<Agent> {
        let provider = self
            .provider
            .ok_or_else(|| ConfigError::Validation("provider is required".into()))?;
        let model = self
            .model
            .ok_or_else(|| ConfigError::Validation("model is required".into()))?;

        Agent::new(self.router, self.tools, self.prompts, provider, model, self.config)
    }
}
