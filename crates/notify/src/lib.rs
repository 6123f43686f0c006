//! Operational alerts for the orchestration core.
//!
//! Every dispatch handled by the orchestrator produces one [`NotifyEvent`],
//! which the [`Notifier`] forwards to all enabled channels. Alert delivery is
//! best-effort: failures are logged and never reach the caller.
//!
//! # Usage
//!
//! ```no_run
//! use notify::{DispatchStatus, Notifier, NotifyEvent};
//!
//! # async fn run() {
//! let notifier = Notifier::from_webhook(Some("https://hooks.example.com/T0".into()));
//!
//! notifier
//!     .deliver(NotifyEvent::dispatch("voting", DispatchStatus::Success, 4))
//!     .await;
//! # }
//! ```
//!
//! Reading `ALERT_WEBHOOK_URL` / `NOTIFY_DISABLED` is left to the caller's
//! configuration layer; see [`Notifier::from_webhook`] and
//! [`Notifier::disabled`].

#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod channels;
pub mod error;
pub mod events;

pub use channels::webhook::WebhookChannel;
pub use channels::NotifyChannel;
pub use error::ChannelError;
pub use events::{DispatchStatus, NotifyEvent, Severity};

use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Upper bound on a single channel delivery when awaiting alerts.
pub const DEFAULT_DELIVERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Central alert dispatcher.
pub struct Notifier {
    channels: Vec<Arc<dyn NotifyChannel>>,
    disabled: bool,
    delivery_timeout: Duration,
}

impl Notifier {
    /// Create a notifier posting to an optional webhook URL.
    #[must_use]
    pub fn from_webhook(webhook_url: Option<String>) -> Self {
        match webhook_url {
            Some(url) => Self::from_channels(vec![Arc::new(WebhookChannel::new(url))]),
            None => Self::from_channels(vec![]),
        }
    }

    fn from_channels(candidates: Vec<Arc<dyn NotifyChannel>>) -> Self {
        let channels: Vec<Arc<dyn NotifyChannel>> =
            candidates.into_iter().filter(|c| c.enabled()).collect();

        if channels.is_empty() {
            warn!("No alert channels configured");
        } else {
            info!(channel_count = channels.len(), "Alert system initialized");
        }

        Self::with_channels(channels)
    }

    /// Create a notifier with specific channels.
    #[must_use]
    pub fn with_channels(channels: Vec<Arc<dyn NotifyChannel>>) -> Self {
        Self {
            channels,
            disabled: false,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    /// Create a disabled notifier (for testing or when alerts are off).
    #[must_use]
    pub const fn disabled() -> Self {
        Self {
            channels: vec![],
            disabled: true,
            delivery_timeout: DEFAULT_DELIVERY_TIMEOUT,
        }
    }

    /// Override the per-channel delivery bound used by [`Notifier::deliver`].
    #[must_use]
    pub fn with_delivery_timeout(mut self, timeout: Duration) -> Self {
        self.delivery_timeout = timeout;
        self
    }

    /// Check if any alert channels are enabled.
    #[must_use]
    pub fn has_channels(&self) -> bool {
        !self.disabled && !self.channels.is_empty()
    }

    /// Get the number of enabled channels.
    #[must_use]
    pub fn channel_count(&self) -> usize {
        if self.disabled {
            0
        } else {
            self.channels.len()
        }
    }

    /// Deliver an alert to every channel and wait for completion.
    ///
    /// Each channel is bounded by the delivery timeout. Failures are logged
    /// and swallowed; the return value is the number of channels that failed.
    pub async fn deliver(&self, event: NotifyEvent) -> usize {
        let mut failures = 0;
        for (channel, result) in self.notify_and_wait(event).await {
            if let Err(e) = result {
                failures += 1;
                warn!(channel = %channel, error = %e, "Alert delivery failed");
            }
        }
        failures
    }

    /// Send an alert and collect the per-channel results.
    pub async fn notify_and_wait(
        &self,
        event: NotifyEvent,
    ) -> Vec<(String, Result<(), ChannelError>)> {
        if !self.has_channels() {
            return vec![];
        }

        let mut results = Vec::with_capacity(self.channels.len());

        for channel in &self.channels {
            let channel_name = channel.name().to_string();
            let result = match tokio::time::timeout(self.delivery_timeout, channel.send(&event))
                .await
            {
                Ok(result) => result,
                Err(_) => Err(ChannelError::Timeout(self.delivery_timeout.as_millis())),
            };
            results.push((channel_name, result));
        }

        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct RecordingChannel {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl NotifyChannel for RecordingChannel {
        fn name(&self) -> &'static str {
            "recording"
        }

        fn enabled(&self) -> bool {
            true
        }

        async fn send(&self, event: &NotifyEvent) -> Result<(), ChannelError> {
            self.sent.lock().unwrap().push(event.message());
            if self.fail {
                Err(ChannelError::Other("channel down".into()))
            } else {
                Ok(())
            }
        }
    }

    struct StalledChannel;

    #[async_trait]
    impl NotifyChannel for StalledChannel {
        fn name(&self) -> &'static str {
            "stalled"
        }

        fn enabled(&self) -> bool {
            true
        }

        async fn send(&self, _event: &NotifyEvent) -> Result<(), ChannelError> {
            std::future::pending::<()>().await;
            Ok(())
        }
    }

    #[test]
    fn test_disabled_notifier() {
        let notifier = Notifier::disabled();
        assert!(!notifier.has_channels());
        assert_eq!(notifier.channel_count(), 0);
    }

    #[test]
    fn test_no_webhook_means_no_channels() {
        let notifier = Notifier::from_webhook(None);
        assert!(!notifier.has_channels());
    }

    #[tokio::test]
    async fn test_deliver_swallows_failures() {
        let channel = Arc::new(RecordingChannel {
            sent: Mutex::new(vec![]),
            fail: true,
        });
        let notifier = Notifier::with_channels(vec![channel.clone()]);

        let failures = notifier
            .deliver(NotifyEvent::dispatch("voting", DispatchStatus::Success, 1))
            .await;

        assert_eq!(failures, 1);
        assert_eq!(channel.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_deliver_is_bounded_by_timeout() {
        let notifier = Notifier::with_channels(vec![Arc::new(StalledChannel)])
            .with_delivery_timeout(Duration::from_millis(250));

        let results = notifier
            .notify_and_wait(NotifyEvent::dispatch("voting", DispatchStatus::Success, 1))
            .await;

        assert_eq!(results.len(), 1);
        assert!(matches!(results[0].1, Err(ChannelError::Timeout(250))));
    }
}
