//! Dispatch metrics.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use serde::Serialize;

/// Metrics key shared by every dispatch to an id with no registered agent.
pub const UNREGISTERED_AGENT: &str = "<unregistered>";

/// Counters for one agent id.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AgentStats {
    pub executed: u64,
    pub failed: u64,
    /// Share of failed dispatches, 0.0 when nothing ran.
    pub error_rate: f64,
}

/// Point-in-time copy of the dispatch counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MetricsSnapshot {
    pub executed: u64,
    pub succeeded: u64,
    pub failed: u64,
    /// Mean duration of successful dispatches.
    pub average_duration_ms: f64,
    pub per_agent: BTreeMap<String, AgentStats>,
}

#[derive(Debug, Default)]
struct State {
    executed: u64,
    succeeded: u64,
    failed: u64,
    success_time: Duration,
    per_agent: BTreeMap<String, (u64, u64)>,
}

/// Thread-safe dispatch counters.
#[derive(Debug, Clone, Default)]
pub struct DispatchMetrics {
    state: Arc<RwLock<State>>,
}

impl DispatchMetrics {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one finished dispatch.
    pub fn record(&self, agent_id: &str, success: bool, elapsed: Duration) {
        let Ok(mut guard) = self.state.write() else {
            return;
        };
        let state = &mut *guard;
        let agent = state.per_agent.entry(agent_id.to_string()).or_default();
        state.executed += 1;
        agent.0 += 1;
        if success {
            state.succeeded += 1;
            state.success_time += elapsed;
        } else {
            state.failed += 1;
            agent.1 += 1;
        }
    }

    /// Stats for one agent id, if it was ever dispatched.
    pub fn agent(&self, agent_id: &str) -> Option<AgentStats> {
        let state = self.state.read().ok()?;
        state
            .per_agent
            .get(agent_id)
            .map(|&(executed, failed)| stats(executed, failed))
    }

    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let Ok(state) = self.state.read() else {
            return MetricsSnapshot::default();
        };
        let average_duration_ms = if state.succeeded == 0 {
            0.0
        } else {
            state.success_time.as_secs_f64() * 1000.0 / state.succeeded as f64
        };
        MetricsSnapshot {
            executed: state.executed,
            succeeded: state.succeeded,
            failed: state.failed,
            average_duration_ms,
            per_agent: state
                .per_agent
                .iter()
                .map(|(id, &(executed, failed))| (id.clone(), stats(executed, failed)))
                .collect(),
        }
    }
}

fn stats(executed: u64, failed: u64) -> AgentStats {
    let error_rate = if executed == 0 {
        0.0
    } else {
        failed as f64 / executed as f64
    };
    AgentStats {
        executed,
        failed,
        error_rate,
    }
}
