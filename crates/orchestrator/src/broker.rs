//! Task broker - feeds queue messages to the orchestrator.

use std::sync::Arc;
use std::time::Duration;

use agents::Task;
use notify::{Notifier, NotifyEvent};
use serde::Serialize;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::dispatch::Orchestrator;
use crate::queue::{Delivery, NackOutcome, QueueError, TaskQueue};

/// Default per-message deadline.
pub const DEFAULT_MESSAGE_DEADLINE: Duration = Duration::from_secs(90);

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("queue error: {0}")]
    Queue(#[from] QueueError),
}

/// Totals for one broker run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BrokerStats {
    /// Messages dispatched and acknowledged
    pub processed: u64,
    /// Messages set aside as unprocessable
    pub dead_lettered: u64,
    /// Messages returned to the queue after missing their deadline
    pub requeued: u64,
}

/// Single consumption loop over a [`TaskQueue`].
///
/// Each message is handled to completion before the next is received.
pub struct TaskBroker {
    queue: Arc<dyn TaskQueue>,
    orchestrator: Arc<Orchestrator>,
    notifier: Arc<Notifier>,
    message_deadline: Duration,
}

impl TaskBroker {
    pub fn new(
        queue: Arc<dyn TaskQueue>,
        orchestrator: Arc<Orchestrator>,
        notifier: Arc<Notifier>,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            notifier,
            message_deadline: DEFAULT_MESSAGE_DEADLINE,
        }
    }

    #[must_use]
    pub fn with_message_deadline(mut self, deadline: Duration) -> Self {
        self.message_deadline = deadline;
        self
    }

    /// Consume until the queue is drained or `shutdown` is cancelled.
    ///
    /// A message already being processed is finished before shutdown.
    pub async fn run(&self, shutdown: CancellationToken) -> Result<BrokerStats, BrokerError> {
        let mut stats = BrokerStats::default();
        info!(
            deadline_secs = self.message_deadline.as_secs(),
            "Task broker started"
        );

        loop {
            let delivery = tokio::select! {
                biased;
                () = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping task broker");
                    break;
                }
                delivery = self.queue.receive() => delivery,
            };
            let Some(delivery) = delivery else {
                info!("Queue drained, stopping task broker");
                break;
            };
            self.handle(delivery, &mut stats).await?;
        }

        info!(
            processed = stats.processed,
            dead_lettered = stats.dead_lettered,
            requeued = stats.requeued,
            "Task broker stopped"
        );
        Ok(stats)
    }

    async fn handle(&self, delivery: Delivery, stats: &mut BrokerStats) -> Result<(), BrokerError> {
        let task = match Task::from_json(&delivery.payload) {
            Ok(task) => task,
            Err(e) => {
                warn!(message_id = delivery.id, error = %e, "Unparseable queue message");
                let reason = format!("unparseable message: {e}");
                self.set_aside(delivery, reason).await?;
                stats.dead_lettered += 1;
                return Ok(());
            }
        };

        debug!(
            message_id = delivery.id,
            attempt = delivery.attempt,
            agent_id = %task.agent_id,
            "Processing message"
        );

        match tokio::time::timeout(self.message_deadline, self.orchestrator.dispatch(&task)).await {
            Ok(result) => {
                self.queue.ack(&delivery).await?;
                stats.processed += 1;
                debug!(
                    message_id = delivery.id,
                    success = result.is_success(),
                    "Message acknowledged"
                );
            }
            Err(_) => {
                warn!(
                    message_id = delivery.id,
                    agent_id = %task.agent_id,
                    deadline_secs = self.message_deadline.as_secs(),
                    "Message missed its deadline"
                );
                let message_id = delivery.id;
                match self.queue.nack(delivery).await? {
                    NackOutcome::Requeued => stats.requeued += 1,
                    NackOutcome::DeadLettered => {
                        stats.dead_lettered += 1;
                        self.notifier
                            .deliver(NotifyEvent::dead_lettered(
                                message_id,
                                "delivery attempts exhausted",
                            ))
                            .await;
                    }
                }
            }
        }
        Ok(())
    }

    async fn set_aside(&self, delivery: Delivery, reason: String) -> Result<(), QueueError> {
        let message_id = delivery.id;
        self.queue.dead_letter(delivery, &reason).await?;
        self.notifier
            .deliver(NotifyEvent::dead_lettered(message_id, reason))
            .await;
        Ok(())
    }
}
