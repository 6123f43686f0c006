//! Task queue contract and the in-process queue.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tokio::sync::Notify;
use tracing::{debug, warn};

/// Queue failures.
#[derive(Debug, Error)]
pub enum QueueError {
    /// The queue source could not be opened. Fatal at startup.
    #[error("queue connection failed: {0}")]
    Connection(String),

    /// The queue no longer accepts messages.
    #[error("queue is closed")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// A message handed to a consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub id: u64,
    pub payload: String,
    /// 1 on first delivery, incremented on every requeue.
    pub attempt: u32,
}

/// Where a negatively acknowledged message went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NackOutcome {
    Requeued,
    DeadLettered,
}

/// A message set aside as unprocessable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetter {
    pub delivery: Delivery,
    pub reason: String,
}

/// At-least-once message source.
///
/// Each delivery is held by one consumer until it is acked, nacked or
/// dead-lettered.
#[async_trait]
pub trait TaskQueue: Send + Sync {
    /// Wait for the next message. `None` once the queue is closed and drained.
    async fn receive(&self) -> Option<Delivery>;

    /// The message was processed.
    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError>;

    /// Return the message for redelivery, or dead-letter it once it has used
    /// up its attempts.
    async fn nack(&self, delivery: Delivery) -> Result<NackOutcome, QueueError>;

    /// Set the message aside without retrying it.
    async fn dead_letter(&self, delivery: Delivery, reason: &str) -> Result<(), QueueError>;

    /// Messages waiting for a consumer.
    fn depth(&self) -> usize;
}

#[derive(Debug, Default)]
struct State {
    ready: VecDeque<Delivery>,
    in_flight: usize,
    closed: bool,
    dead_letters: Vec<DeadLetter>,
}

/// In-process queue.
///
/// Messages live only as long as the process; running several brokers
/// against one stream needs an external queue implementing [`TaskQueue`].
#[derive(Debug)]
pub struct MemoryQueue {
    state: Mutex<State>,
    changed: Notify,
    next_id: AtomicU64,
    max_attempts: u32,
}

impl MemoryQueue {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            state: Mutex::new(State::default()),
            changed: Notify::new(),
            next_id: AtomicU64::new(1),
            max_attempts: max_attempts.max(1),
        }
    }

    /// Enqueue a raw message, returning its id.
    pub fn push(&self, payload: impl Into<String>) -> Result<u64, QueueError> {
        let mut state = self.lock();
        if state.closed {
            return Err(QueueError::Closed);
        }
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        state.ready.push_back(Delivery {
            id,
            payload: payload.into(),
            attempt: 1,
        });
        drop(state);
        self.changed.notify_waiters();
        Ok(id)
    }

    /// Stop accepting messages. Consumers drain what is left, including
    /// requeued messages.
    pub fn close(&self) {
        self.lock().closed = true;
        self.changed.notify_waiters();
    }

    /// Enqueue every non-blank line of a JSON-lines source.
    pub async fn feed_lines<R>(&self, reader: R) -> Result<usize, QueueError>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut lines = reader.lines();
        let mut count = 0;
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            self.push(line)?;
            count += 1;
        }
        debug!(count, "Finished reading queue source");
        Ok(count)
    }

    /// Messages waiting for a consumer.
    pub fn pending(&self) -> usize {
        self.lock().ready.len()
    }

    pub fn dead_letters(&self) -> Vec<DeadLetter> {
        self.lock().dead_letters.clone()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn settle(&self) -> MutexGuard<'_, State> {
        let mut state = self.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
        state
    }
}

#[async_trait]
impl TaskQueue for MemoryQueue {
    async fn receive(&self) -> Option<Delivery> {
        loop {
            let changed = self.changed.notified();
            {
                let mut state = self.lock();
                if let Some(delivery) = state.ready.pop_front() {
                    state.in_flight += 1;
                    return Some(delivery);
                }
                if state.closed && state.in_flight == 0 {
                    return None;
                }
            }
            changed.await;
        }
    }

    async fn ack(&self, delivery: &Delivery) -> Result<(), QueueError> {
        drop(self.settle());
        debug!(message_id = delivery.id, "Message acknowledged");
        self.changed.notify_waiters();
        Ok(())
    }

    async fn nack(&self, mut delivery: Delivery) -> Result<NackOutcome, QueueError> {
        let mut state = self.settle();
        let outcome = if delivery.attempt >= self.max_attempts {
            warn!(
                message_id = delivery.id,
                attempts = delivery.attempt,
                "Message exhausted its delivery attempts"
            );
            let reason = format!("gave up after {} attempts", delivery.attempt);
            state.dead_letters.push(DeadLetter { delivery, reason });
            NackOutcome::DeadLettered
        } else {
            delivery.attempt += 1;
            state.ready.push_back(delivery);
            NackOutcome::Requeued
        };
        drop(state);
        self.changed.notify_waiters();
        Ok(outcome)
    }

    async fn dead_letter(&self, delivery: Delivery, reason: &str) -> Result<(), QueueError> {
        let mut state = self.settle();
        state.dead_letters.push(DeadLetter {
            delivery,
            reason: reason.to_string(),
        });
        drop(state);
        self.changed.notify_waiters();
        Ok(())
    }

    fn depth(&self) -> usize {
        self.pending()
    }
}

/// Open a JSON-lines queue source: a file path, or `-` for stdin.
pub async fn open_source(path: &str) -> Result<Box<dyn AsyncBufRead + Send + Unpin>, QueueError> {
    if path == "-" {
        return Ok(Box::new(BufReader::new(tokio::io::stdin())));
    }
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| QueueError::Connection(format!("{path}: {e}")))?;
    Ok(Box::new(BufReader::new(file)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::time::Duration;

    #[tokio::test]
    async fn test_fifo_and_close() {
        let queue = MemoryQueue::new(3);
        queue.push("a").unwrap();
        queue.push("b").unwrap();
        queue.close();
        assert!(matches!(queue.push("c"), Err(QueueError::Closed)));

        let first = queue.receive().await.unwrap();
        assert_eq!((first.payload.as_str(), first.attempt), ("a", 1));
        queue.ack(&first).await.unwrap();
        let second = queue.receive().await.unwrap();
        queue.ack(&second).await.unwrap();

        assert_eq!(queue.receive().await, None);
    }

    #[tokio::test]
    async fn test_nack_requeues_then_dead_letters() {
        let queue = MemoryQueue::new(2);
        queue.push("flaky").unwrap();
        queue.close();

        let first = queue.receive().await.unwrap();
        assert_eq!(queue.nack(first).await.unwrap(), NackOutcome::Requeued);

        let second = queue.receive().await.unwrap();
        assert_eq!(second.attempt, 2);
        assert_eq!(queue.nack(second).await.unwrap(), NackOutcome::DeadLettered);

        assert_eq!(queue.receive().await, None);
        let dead = queue.dead_letters();
        assert_eq!(dead.len(), 1);
        assert_eq!(dead[0].delivery.payload, "flaky");
    }

    #[tokio::test]
    async fn test_receive_waits_for_push() {
        let queue = Arc::new(MemoryQueue::new(1));
        let consumer = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        queue.push("late").unwrap();

        let delivery = consumer.await.unwrap().unwrap();
        assert_eq!(delivery.payload, "late");
    }

    #[tokio::test]
    async fn test_closed_queue_waits_for_in_flight() {
        let queue = Arc::new(MemoryQueue::new(3));
        queue.push("only").unwrap();
        queue.close();
        let held = queue.receive().await.unwrap();

        let waiter = {
            let queue = queue.clone();
            tokio::spawn(async move { queue.receive().await })
        };
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(!waiter.is_finished());

        queue.nack(held).await.unwrap();
        let redelivered = waiter.await.unwrap().unwrap();
        assert_eq!(redelivered.attempt, 2);
    }

    #[tokio::test]
    async fn test_feed_lines_skips_blank_lines() {
        let queue = MemoryQueue::new(1);
        let input: &[u8] = b"{\"agent_id\":\"a\",\"context\":{}}\n\n   \nnot json\n";
        let count = queue.feed_lines(input).await.unwrap();

        assert_eq!(count, 2);
        assert_eq!(queue.pending(), 2);
    }

    #[tokio::test]
    async fn test_missing_source_is_connection_error() {
        let result = open_source("/definitely/not/here.jsonl").await;
        assert!(matches!(result, Err(QueueError::Connection(_))));
    }
}
