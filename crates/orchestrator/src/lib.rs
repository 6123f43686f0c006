//! # Orchestrator
//!
//! The task orchestration core: pulls task messages from a queue, routes them
//! to agents through a static registry, and reports every outcome.
//!
//! ```text
//! TaskQueue -> TaskBroker -> Orchestrator -> AgentRegistry -> Agent
//!                                  |
//!                                  +-> Notifier (one alert per dispatch)
//! ```
//!
//! [`HealthMonitor`] checks the registered agents on an interval alongside
//! the broker.
//!
//! Only a failure to open the queue is fatal. Everything that goes wrong
//! inside a dispatch comes back as an error [`agents::AgentResult`].

pub mod bootstrap;
pub mod broker;
pub mod config;
pub mod dispatch;
pub mod health;
pub mod metrics;
pub mod queue;

pub use broker::{BrokerError, BrokerStats, TaskBroker};
pub use config::Config;
pub use dispatch::{AgentReport, Orchestrator};
pub use health::{AgentHealth, HealthMonitor, HealthReport, SystemStatus};
pub use metrics::{AgentStats, DispatchMetrics, MetricsSnapshot, UNREGISTERED_AGENT};
pub use queue::{open_source, DeadLetter, Delivery, MemoryQueue, NackOutcome, QueueError, TaskQueue};
