//! Periodic health checks and the system status snapshot.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::Orchestrator;
use crate::metrics::MetricsSnapshot;
use crate::queue::TaskQueue;

/// Upper bound on one agent's health check.
pub const HEALTH_CHECK_TIMEOUT: Duration = Duration::from_secs(5);

/// Default pause between health checks.
pub const DEFAULT_HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(30);

/// Queue depth above which a health check logs a warning.
pub const QUEUE_DEPTH_WARNING: usize = 100;

/// Health check result for one agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentHealth {
    pub agent_id: String,
    pub healthy: bool,
    /// Why the check failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub problem: Option<String>,
}

impl AgentHealth {
    pub fn new(agent_id: impl Into<String>, problem: Option<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            healthy: problem.is_none(),
            problem,
        }
    }
}

/// Outcome of one round of agent health checks, sorted by agent id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthReport {
    pub healthy: bool,
    pub agents: Vec<AgentHealth>,
}

impl HealthReport {
    pub fn new(mut agents: Vec<AgentHealth>) -> Self {
        agents.sort_by(|a, b| a.agent_id.cmp(&b.agent_id));
        Self {
            healthy: agents.iter().all(|a| a.healthy),
            agents,
        }
    }

    /// Ids of agents whose health check failed.
    pub fn unhealthy(&self) -> Vec<&str> {
        self.agents
            .iter()
            .filter(|a| !a.healthy)
            .map(|a| a.agent_id.as_str())
            .collect()
    }
}

/// Point-in-time view of the whole orchestrator.
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    /// Whether the monitor loop is live.
    pub running: bool,
    pub registered_agents: Vec<String>,
    pub queue_pending: usize,
    /// Most recent health check, if one has run.
    pub health: Option<HealthReport>,
    pub metrics: MetricsSnapshot,
}

/// Runs health checks on an interval and keeps the latest report.
pub struct HealthMonitor {
    orchestrator: Arc<Orchestrator>,
    queue: Arc<dyn TaskQueue>,
    interval: Duration,
    running: AtomicBool,
    last: RwLock<Option<HealthReport>>,
}

impl HealthMonitor {
    pub fn new(orchestrator: Arc<Orchestrator>, queue: Arc<dyn TaskQueue>) -> Self {
        Self {
            orchestrator,
            queue,
            interval: DEFAULT_HEALTH_CHECK_INTERVAL,
            running: AtomicBool::new(false),
            last: RwLock::new(None),
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Check every agent once, log the outcome and keep the report.
    pub async fn check_once(&self) -> HealthReport {
        let report = self.orchestrator.health_check().await;
        let queue_pending = self.queue.depth();

        if report.healthy && queue_pending <= QUEUE_DEPTH_WARNING {
            debug!(queue_pending, "Health check OK");
        } else {
            warn!(
                unhealthy_agents = ?report.unhealthy(),
                queue_pending,
                "Health check found problems"
            );
        }

        *self.last.write().unwrap_or_else(PoisonError::into_inner) = Some(report.clone());
        report
    }

    /// Check on every tick until `shutdown` is cancelled.
    pub async fn run(self: Arc<Self>, shutdown: CancellationToken) {
        self.running.store(true, Ordering::SeqCst);
        info!(interval_secs = self.interval.as_secs(), "Health monitor started");

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                biased;
                () = shutdown.cancelled() => break,
                _ = ticker.tick() => {
                    self.check_once().await;
                }
            }
        }

        self.running.store(false, Ordering::SeqCst);
        info!("Health monitor stopped");
    }

    pub fn last_report(&self) -> Option<HealthReport> {
        self.last
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn status(&self) -> SystemStatus {
        SystemStatus {
            running: self.running.load(Ordering::SeqCst),
            registered_agents: self.orchestrator.registry().ids(),
            queue_pending: self.queue.depth(),
            health: self.last_report(),
            metrics: self.orchestrator.metrics(),
        }
    }
}
