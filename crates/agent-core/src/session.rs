//! Session Management
//!
//! An `AgentSession` owns one transcript, the step counter, and the terminal
//! status. It lives for a single task and is never persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AgentError, ErrorKind};
use crate::message::{ChatMessage, Transcript};

/// Unique session identifier
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a session
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum SessionStatus {
    Running,
    FinalAnswer,
    StepLimitExceeded,
    Error { kind: ErrorKind, reason: String },
}

impl SessionStatus {
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Running)
    }

    pub fn from_error(err: &AgentError) -> Self {
        Self::Error {
            kind: err.kind(),
            reason: err.to_string(),
        }
    }
}

/// State of one agent task
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AgentSession {
    /// Unique identifier
    pub id: SessionId,

    transcript: Transcript,
    step: usize,
    max_steps: usize,
    status: SessionStatus,

    /// JSON reminders sent for malformed replies
    #[serde(default)]
    pub(crate) reprompts: u32,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last activity timestamp
    pub updated_at: DateTime<Utc>,
}

impl AgentSession {
    /// Start a session from its seeded transcript
    pub fn new(transcript: Transcript, max_steps: usize) -> Self {
        let now = Utc::now();
        Self {
            id: SessionId::new(),
            transcript,
            step: 0,
            max_steps,
            status: SessionStatus::Running,
            reprompts: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Update the activity timestamp
    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub const fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub const fn step(&self) -> usize {
        self.step
    }

    pub const fn max_steps(&self) -> usize {
        self.max_steps
    }

    pub const fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub const fn is_running(&self) -> bool {
        matches!(self.status, SessionStatus::Running)
    }

    /// True once no further tool execution is permitted
    pub const fn steps_exhausted(&self) -> bool {
        self.step >= self.max_steps
    }

    /// Append to the transcript
    pub fn push(&mut self, message: ChatMessage) {
        self.transcript.push(message);
        self.touch();
    }

    pub(crate) fn advance_step(&mut self) {
        self.step += 1;
        self.touch();
    }

    /// Move to a terminal status. The first terminal status wins; returns
    /// false if the session had already ended.
    pub fn finish(&mut self, status: SessionStatus) -> bool {
        if self.status.is_terminal() || !status.is_terminal() {
            return false;
        }
        self.status = status;
        self.touch();
        true
    }

    /// Duration since creation
    pub fn duration(&self) -> chrono::Duration {
        self.updated_at - self.created_at
    }
}
