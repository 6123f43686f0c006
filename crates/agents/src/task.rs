//! Task and result types shared by the broker, orchestrator and agents.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::errors::AgentError;

/// Free-form JSON payload handed to an agent.
pub type Context = Map<String, Value>;

/// A unit of work naming an agent and its input.
///
/// This is also the exact wire shape of a queue message; any other shape is
/// rejected when parsing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Task {
    /// Identifier of the agent that should handle the task
    pub agent_id: String,
    /// Agent-specific input
    pub context: Context,
}

impl Task {
    /// Create a new task.
    pub fn new(agent_id: impl Into<String>, context: Context) -> Self {
        Self {
            agent_id: agent_id.into(),
            context,
        }
    }

    /// Parse a task from a raw queue message.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// Terminal status of an agent invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Success,
    Error,
}

/// Uniform result returned for every dispatch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentResult {
    pub status: AgentStatus,
    pub data: Option<Context>,
    pub message: Option<String>,
}

impl AgentResult {
    /// A successful result carrying data.
    #[must_use]
    pub fn success(data: Context) -> Self {
        Self {
            status: AgentStatus::Success,
            data: Some(data),
            message: None,
        }
    }

    /// An error result with a human-readable description.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: AgentStatus::Error,
            data: None,
            message: Some(message.into()),
        }
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status == AgentStatus::Success
    }
}

impl From<Result<Context, AgentError>> for AgentResult {
    fn from(result: Result<Context, AgentError>) -> Self {
        match result {
            Ok(data) => Self::success(data),
            Err(e) => Self::error(e.to_string()),
        }
    }
}
