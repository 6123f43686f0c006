//! Runtime configuration for the orchestrator.

use std::env;
use std::time::Duration;

use agents::generation::anthropic::DEFAULT_MODEL;
use agents::RetentionPolicy;
use anyhow::{bail, Result};
use notify::DEFAULT_DELIVERY_TIMEOUT;
use tracing::warn;

/// Orchestrator configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Failure-boundary deadline for one dispatch.
    pub task_timeout: Duration,
    /// Deadline for one generation backend call.
    pub generation_timeout: Duration,
    /// Deadline for one queue message before it is requeued.
    pub message_deadline: Duration,
    /// Deliveries of one message before it is dead-lettered.
    pub max_delivery_attempts: u32,
    /// Lifetime of cached narrative segments.
    pub narrative_cache_ttl: Duration,
    /// Vote tally retention.
    pub vote_retention: RetentionPolicy,
    /// Upper bound on options kept per generated segment.
    pub max_options: usize,
    /// Incoming webhook for operational alerts.
    pub alert_webhook_url: Option<String>,
    /// Upper bound on delivering one alert.
    pub alert_timeout: Duration,
    /// Pause between periodic health checks while serving.
    pub health_check_interval: Duration,
    /// Whether alerts are turned off entirely.
    pub notify_disabled: bool,
    /// Generation model name.
    pub generation_model: String,
    /// Override for the generation endpoint.
    pub generation_base_url: Option<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self::from_env()
    }
}

impl Config {
    /// Read configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Read configuration through an arbitrary variable lookup.
    ///
    /// Unparseable values fall back to their defaults with a warning.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let secs = |key: &str, default: u64| Duration::from_secs(parsed(key, var(key), default));

        let vote_retention = var("ORCH_VOTE_RETENTION")
            .and_then(|raw| {
                raw.parse::<RetentionPolicy>()
                    .map_err(|e| warn!(error = %e, "Ignoring ORCH_VOTE_RETENTION"))
                    .ok()
            })
            .unwrap_or_default();

        Self {
            task_timeout: secs("ORCH_TASK_TIMEOUT_SECS", 60),
            generation_timeout: secs("ORCH_GENERATION_TIMEOUT_SECS", 30),
            message_deadline: secs("ORCH_MESSAGE_DEADLINE_SECS", 90),
            max_delivery_attempts: parsed(
                "ORCH_MAX_DELIVERY_ATTEMPTS",
                var("ORCH_MAX_DELIVERY_ATTEMPTS"),
                5,
            ),
            narrative_cache_ttl: secs("ORCH_NARRATIVE_CACHE_TTL_SECS", 3600),
            vote_retention,
            max_options: parsed("ORCH_MAX_OPTIONS", var("ORCH_MAX_OPTIONS"), 5),
            alert_webhook_url: var("ALERT_WEBHOOK_URL"),
            alert_timeout: secs("ORCH_ALERT_TIMEOUT_SECS", DEFAULT_DELIVERY_TIMEOUT.as_secs()),
            health_check_interval: secs("ORCH_HEALTH_CHECK_INTERVAL_SECS", 30),
            notify_disabled: var("NOTIFY_DISABLED")
                .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1"),
            generation_model: var("ORCH_GENERATION_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            generation_base_url: var("ANTHROPIC_BASE_URL"),
        }
    }

    /// Longest a single dispatch can take: the agent call plus its alert.
    pub fn dispatch_bound(&self) -> Duration {
        self.task_timeout + self.alert_timeout
    }

    /// Reject settings the broker cannot run with.
    ///
    /// The message deadline must outlast [`Config::dispatch_bound`]. A
    /// deadline that fires first abandons a dispatch whose writes may have
    /// landed, and redelivery would apply them again.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("task timeout", self.task_timeout),
            ("generation timeout", self.generation_timeout),
            ("message deadline", self.message_deadline),
            ("narrative cache TTL", self.narrative_cache_ttl),
            ("alert timeout", self.alert_timeout),
            ("health check interval", self.health_check_interval),
        ] {
            if value.is_zero() {
                bail!("{name} must be greater than zero");
            }
        }
        if self.max_delivery_attempts == 0 {
            bail!("max delivery attempts must be at least 1");
        }
        if self.max_options == 0 {
            bail!("max options must be at least 1");
        }
        if self.message_deadline <= self.dispatch_bound() {
            bail!(
                "message deadline ({}s) must exceed task timeout plus alert timeout ({}s)",
                self.message_deadline.as_secs(),
                self.dispatch_bound().as_secs()
            );
        }
        Ok(())
    }
}

fn parsed<T: std::str::FromStr>(key: &str, raw: Option<String>, default: T) -> T {
    match raw {
        Some(raw) => raw.trim().parse().unwrap_or_else(|_| {
            warn!(key, value = %raw, "Ignoring unparseable setting");
            default
        }),
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]);
        assert_eq!(config.task_timeout, Duration::from_secs(60));
        assert_eq!(config.generation_timeout, Duration::from_secs(30));
        assert_eq!(config.message_deadline, Duration::from_secs(90));
        assert_eq!(config.max_delivery_attempts, 5);
        assert_eq!(config.narrative_cache_ttl, Duration::from_secs(3600));
        assert_eq!(config.vote_retention, RetentionPolicy::default());
        assert_eq!(config.max_options, 5);
        assert_eq!(config.alert_webhook_url, None);
        assert_eq!(config.alert_timeout, Duration::from_secs(5));
        assert_eq!(config.health_check_interval, Duration::from_secs(30));
        assert!(!config.notify_disabled);
        assert_eq!(config.generation_model, DEFAULT_MODEL);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("ORCH_TASK_TIMEOUT_SECS", "10"),
            ("ORCH_VOTE_RETENTION", "permanent"),
            ("ORCH_MAX_OPTIONS", "3"),
            ("ALERT_WEBHOOK_URL", "https://hooks.example.com/x"),
            ("NOTIFY_DISABLED", "1"),
        ]);
        assert_eq!(config.task_timeout, Duration::from_secs(10));
        assert_eq!(config.vote_retention, RetentionPolicy::Permanent);
        assert_eq!(config.max_options, 3);
        assert_eq!(
            config.alert_webhook_url.as_deref(),
            Some("https://hooks.example.com/x")
        );
        assert!(config.notify_disabled);
    }

    #[test]
    fn test_bad_values_fall_back() {
        let config = load(&[
            ("ORCH_TASK_TIMEOUT_SECS", "soon"),
            ("ORCH_VOTE_RETENTION", "forever"),
            ("ALERT_WEBHOOK_URL", "  "),
        ]);
        assert_eq!(config.task_timeout, Duration::from_secs(60));
        assert_eq!(config.vote_retention, RetentionPolicy::default());
        assert_eq!(config.alert_webhook_url, None);
    }

    #[test]
    fn test_validate_rejects_zero_timeouts() {
        let config = load(&[("ORCH_GENERATION_TIMEOUT_SECS", "0")]);
        assert!(config.validate().is_err());

        let config = load(&[("ORCH_MAX_DELIVERY_ATTEMPTS", "0")]);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_requires_deadline_beyond_dispatch_bound() {
        let config = load(&[("ORCH_MESSAGE_DEADLINE_SECS", "3")]);
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("must exceed task timeout plus alert timeout"));

        // Equal to the task timeout still leaves no room for the alert.
        let config = load(&[
            ("ORCH_TASK_TIMEOUT_SECS", "30"),
            ("ORCH_MESSAGE_DEADLINE_SECS", "30"),
        ]);
        assert!(config.validate().is_err());

        let config = load(&[
            ("ORCH_TASK_TIMEOUT_SECS", "30"),
            ("ORCH_ALERT_TIMEOUT_SECS", "5"),
            ("ORCH_MESSAGE_DEADLINE_SECS", "35"),
        ]);
        assert!(config.validate().is_err());

        let config = load(&[
            ("ORCH_TASK_TIMEOUT_SECS", "30"),
            ("ORCH_ALERT_TIMEOUT_SECS", "5"),
            ("ORCH_MESSAGE_DEADLINE_SECS", "36"),
        ]);
        assert!(config.validate().is_ok());
        assert_eq!(config.dispatch_bound(), Duration::from_secs(35));
    }
}
