//! Startup wiring: builds the registry, notifier and orchestrator from config.

use std::sync::Arc;
use std::time::Duration;

use agents::{
    AgentRegistry, AnthropicGenerator, CacheBackend, CoachingAgent, ContentCache, NarrativeAgent,
    NarrativeConfig, RegistryError, TextGenerator, VoteStore, VotingAgent,
};
use notify::Notifier;
use tracing::{info, warn};

use crate::config::Config;
use crate::dispatch::Orchestrator;

/// How often the in-memory cache drops expired entries.
pub const CACHE_JANITOR_INTERVAL: Duration = Duration::from_secs(60);

/// Alert sink described by the config.
pub fn notifier(config: &Config) -> Notifier {
    if config.notify_disabled {
        info!("Alerts disabled via NOTIFY_DISABLED");
        return Notifier::disabled();
    }
    Notifier::from_webhook(config.alert_webhook_url.clone())
        .with_delivery_timeout(config.alert_timeout)
}

/// Generation backend described by the config and `ANTHROPIC_API_KEY`.
pub fn generator(config: &Config) -> AnthropicGenerator {
    let mut generator = AnthropicGenerator::from_env().with_model(&config.generation_model);
    if let Some(url) = &config.generation_base_url {
        generator = generator.with_base_url(url);
    }
    if !generator.is_configured() {
        warn!("ANTHROPIC_API_KEY not set; narrative tasks will fail");
    }
    generator
}

/// Register every agent against a shared store.
pub fn build_registry(
    config: &Config,
    store: Arc<dyn CacheBackend>,
    generator: Arc<dyn TextGenerator>,
) -> Result<AgentRegistry, RegistryError> {
    let narrative = NarrativeAgent::new(
        generator,
        ContentCache::new(Arc::clone(&store), config.narrative_cache_ttl),
    )
    .with_config(NarrativeConfig {
        generation_timeout: config.generation_timeout,
        max_options: config.max_options,
    });
    let voting = VotingAgent::new(VoteStore::new(Arc::clone(&store), config.vote_retention));
    let coaching = CoachingAgent::new(store);

    let registry = AgentRegistry::builder()
        .register(Arc::new(narrative))
        .register(Arc::new(voting))
        .register(Arc::new(coaching))
        .build()?;

    info!(
        agents = ?registry.ids(),
        vote_retention = %config.vote_retention,
        "Agent registry ready"
    );
    Ok(registry)
}

/// Orchestrator over `registry` with the configured task timeout.
pub fn orchestrator(
    config: &Config,
    registry: Arc<AgentRegistry>,
    notifier: Arc<Notifier>,
) -> Orchestrator {
    Orchestrator::new(registry, notifier).with_task_timeout(config.task_timeout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use agents::MemoryCache;

    #[test]
    fn test_registry_has_all_agents() {
        let config = Config::from_lookup(|_| None);
        let registry = build_registry(
            &config,
            Arc::new(MemoryCache::new()),
            Arc::new(AnthropicGenerator::new("test-key")),
        )
        .unwrap();

        assert_eq!(
            registry.ids(),
            vec!["coaching", "narrative_architect", "voting"]
        );
        assert_eq!(registry.find_by_capability("tally"), vec!["voting"]);
    }

    #[test]
    fn test_disabled_notifier() {
        let config = Config {
            notify_disabled: true,
            alert_webhook_url: Some("https://hooks.example.com/x".into()),
            ..Config::from_lookup(|_| None)
        };
        assert!(!notifier(&config).has_channels());
    }
}
