//! Orchestrator - resolves tasks to agents behind a single failure boundary.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::{Duration, Instant};

use agents::{AgentError, AgentRegistration, AgentRegistry, AgentResult, Context, Task};
use futures::FutureExt;
use notify::{DispatchStatus, Notifier, NotifyEvent};
use serde::Serialize;
use tracing::{debug, error, info, warn};

use crate::health::{AgentHealth, HealthReport, HEALTH_CHECK_TIMEOUT};
use crate::metrics::{AgentStats, DispatchMetrics, MetricsSnapshot, UNREGISTERED_AGENT};

/// Default failure-boundary deadline.
pub const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(60);

/// Registration and counters for one agent id.
#[derive(Debug, Clone, Serialize)]
pub struct AgentReport {
    pub agent_id: String,
    /// `None` for ids that were requested but never registered.
    pub registration: Option<AgentRegistration>,
    pub stats: AgentStats,
}

/// Routes tasks to registered agents.
///
/// `dispatch` never fails: unknown agents, agent errors, timeouts and panics
/// all come back as an error [`AgentResult`]. Each call emits exactly one
/// alert, whose delivery failures are logged and dropped.
pub struct Orchestrator {
    registry: Arc<AgentRegistry>,
    notifier: Arc<Notifier>,
    task_timeout: Duration,
    metrics: DispatchMetrics,
}

impl Orchestrator {
    pub fn new(registry: Arc<AgentRegistry>, notifier: Arc<Notifier>) -> Self {
        Self {
            registry,
            notifier,
            task_timeout: DEFAULT_TASK_TIMEOUT,
            metrics: DispatchMetrics::new(),
        }
    }

    #[must_use]
    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.task_timeout = timeout;
        self
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    /// Run a task and report its outcome.
    pub async fn dispatch(&self, task: &Task) -> AgentResult {
        let started = Instant::now();
        let outcome = self.execute(task).await;
        let elapsed = started.elapsed();

        // Unknown ids share one bucket so queue garbage cannot grow the map.
        let metrics_key = if self.registry.contains(&task.agent_id) {
            task.agent_id.as_str()
        } else {
            UNREGISTERED_AGENT
        };
        self.metrics.record(metrics_key, outcome.is_ok(), elapsed);

        let status = match &outcome {
            Ok(_) => DispatchStatus::Success,
            Err(message) => DispatchStatus::Error(message.clone()),
        };
        let failures = self
            .notifier
            .deliver(NotifyEvent::dispatch(
                task.agent_id.clone(),
                status,
                u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX),
            ))
            .await;
        if failures > 0 {
            debug!(agent_id = %task.agent_id, failures, "Dispatch alert not delivered");
        }

        match outcome {
            Ok(data) => AgentResult::success(data),
            Err(message) => AgentResult::error(message),
        }
    }

    async fn execute(&self, task: &Task) -> Result<Context, String> {
        let Some(agent) = self.registry.get(&task.agent_id) else {
            warn!(agent_id = %task.agent_id, "No agent registered for task");
            return Err(AgentError::UnknownAgent(task.agent_id.clone()).to_string());
        };

        debug!(agent_id = %task.agent_id, "Dispatching task");
        let run = AssertUnwindSafe(agent.execute(&task.context)).catch_unwind();

        match tokio::time::timeout(self.task_timeout, run).await {
            Ok(Ok(Ok(data))) => {
                info!(agent_id = %task.agent_id, "Task completed");
                Ok(data)
            }
            Ok(Ok(Err(e))) => {
                warn!(
                    agent_id = %task.agent_id,
                    kind = e.kind(),
                    retryable = e.is_retryable(),
                    error = %e,
                    "Task failed"
                );
                Err(e.to_string())
            }
            Ok(Err(panic)) => {
                let detail = panic_message(panic.as_ref());
                error!(agent_id = %task.agent_id, panic = %detail, "Agent panicked");
                Err(format!("Agent panicked: {detail}"))
            }
            Err(_) => {
                warn!(
                    agent_id = %task.agent_id,
                    timeout_secs = self.task_timeout.as_secs_f64(),
                    "Task timed out"
                );
                Err(format!(
                    "Agent timed out after {}ms",
                    self.task_timeout.as_millis()
                ))
            }
        }
    }

    /// Counters across all dispatches so far.
    pub fn metrics(&self) -> MetricsSnapshot {
        self.metrics.snapshot()
    }

    /// Check every registered agent in parallel, each bounded by
    /// [`HEALTH_CHECK_TIMEOUT`].
    pub async fn health_check(&self) -> HealthReport {
        let checks = self.registry.ids().into_iter().filter_map(|agent_id| {
            let agent = self.registry.get(&agent_id)?;
            Some(async move {
                let check = AssertUnwindSafe(agent.health_check()).catch_unwind();
                let problem = match tokio::time::timeout(HEALTH_CHECK_TIMEOUT, check).await {
                    Ok(Ok(Ok(()))) => None,
                    Ok(Ok(Err(e))) => Some(e.to_string()),
                    Ok(Err(panic)) => {
                        Some(format!("Agent panicked: {}", panic_message(panic.as_ref())))
                    }
                    Err(_) => Some(format!(
                        "health check timed out after {}ms",
                        HEALTH_CHECK_TIMEOUT.as_millis()
                    )),
                };
                AgentHealth::new(agent_id, problem)
            })
        });

        HealthReport::new(futures::future::join_all(checks).await)
    }

    /// Registration and counters for one agent id.
    ///
    /// Ids that were never registered are counted together under
    /// [`UNREGISTERED_AGENT`] and report `None` here.
    pub fn agent_status(&self, agent_id: &str) -> Option<AgentReport> {
        let registration = self.registry.registration(agent_id);
        let stats = self.metrics.agent(agent_id);
        if registration.is_none() && stats.is_none() {
            return None;
        }
        Some(AgentReport {
            agent_id: agent_id.to_string(),
            registration,
            stats: stats.unwrap_or_default(),
        })
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
