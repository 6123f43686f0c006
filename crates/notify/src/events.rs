//! Alert event types emitted by the orchestration core.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Severity levels for alerts, serialized lowercase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational - normal operations
    Info,
    /// Warning - something needs attention
    Warning,
    /// Critical - immediate action required
    Critical,
}

/// Terminal status of a single dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchStatus {
    /// The agent finished and produced data
    Success,
    /// The dispatch ended in an error result
    Error(String),
}

impl std::fmt::Display for DispatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Success => write!(f, "success"),
            Self::Error(detail) => write!(f, "error: {detail}"),
        }
    }
}

/// Events that can trigger alerts.
#[derive(Debug, Clone)]
pub enum NotifyEvent {
    /// A task finished dispatching (successfully or not)
    DispatchCompleted {
        agent_id: String,
        status: DispatchStatus,
        duration_ms: u64,
        timestamp: DateTime<Utc>,
    },

    /// A queue message could not be processed and was set aside
    MessageDeadLettered {
        message_id: u64,
        reason: String,
        timestamp: DateTime<Utc>,
    },
}

impl NotifyEvent {
    /// Build a dispatch outcome event stamped with the current time.
    #[must_use]
    pub fn dispatch(agent_id: impl Into<String>, status: DispatchStatus, duration_ms: u64) -> Self {
        Self::DispatchCompleted {
            agent_id: agent_id.into(),
            status,
            duration_ms,
            timestamp: Utc::now(),
        }
    }

    /// Build a dead-letter event stamped with the current time.
    #[must_use]
    pub fn dead_lettered(message_id: u64, reason: impl Into<String>) -> Self {
        Self::MessageDeadLettered {
            message_id,
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    /// Plain text rendering delivered to alert channels.
    ///
    /// Always names the agent id and terminal status, e.g.
    /// `agent voting: error: Validation error: narrative_id must not be empty (3ms)`.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::DispatchCompleted {
                agent_id,
                status,
                duration_ms,
                ..
            } => format!("agent {agent_id}: {status} ({duration_ms}ms)"),
            Self::MessageDeadLettered {
                message_id, reason, ..
            } => format!("message #{message_id} dead-lettered: {reason}"),
        }
    }

    /// Get the severity for this event.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::DispatchCompleted { status, .. } => match status {
                DispatchStatus::Success => Severity::Info,
                DispatchStatus::Error(_) => Severity::Warning,
            },
            Self::MessageDeadLettered { .. } => Severity::Critical,
        }
    }

    /// Get the timestamp for this event.
    #[must_use]
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Self::DispatchCompleted { timestamp, .. }
            | Self::MessageDeadLettered { timestamp, .. } => *timestamp,
        }
    }
}
