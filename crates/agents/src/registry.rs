//! Agent Registry - static mapping from agent id to handler.
//!
//! The registry is assembled once at startup through [`AgentRegistryBuilder`]
//! and is read-only afterwards, so lookups need no locking.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::agent::Agent;

/// Errors raised while assembling the registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Two handlers claimed the same id.
    #[error("Agent '{0}' is registered more than once")]
    Duplicate(String),
}

/// Static description of a registered agent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgentRegistration {
    pub agent_id: String,
    pub description: String,
    pub capability_tags: BTreeSet<String>,
}

/// Read-only lookup table of agents.
pub struct AgentRegistry {
    agents: HashMap<String, Arc<dyn Agent>>,
}

impl AgentRegistry {
    /// Start assembling a registry.
    #[must_use]
    pub fn builder() -> AgentRegistryBuilder {
        AgentRegistryBuilder::default()
    }

    /// Get an agent by id. Unknown ids are not an error here.
    pub fn get(&self, agent_id: &str) -> Option<Arc<dyn Agent>> {
        self.agents.get(agent_id).cloned()
    }

    /// Check if an agent is registered.
    pub fn contains(&self, agent_id: &str) -> bool {
        self.agents.contains_key(agent_id)
    }

    /// All registered ids, sorted.
    pub fn ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.agents.keys().cloned().collect();
        ids.sort();
        ids
    }

    /// Registration details for every agent, sorted by id.
    pub fn registrations(&self) -> Vec<AgentRegistration> {
        self.ids()
            .into_iter()
            .filter_map(|id| self.registration(&id))
            .collect()
    }

    /// Registration details for one agent.
    pub fn registration(&self, agent_id: &str) -> Option<AgentRegistration> {
        self.agents.get(agent_id).map(|agent| AgentRegistration {
            agent_id: agent.id().to_string(),
            description: agent.description().to_string(),
            capability_tags: agent
                .capabilities()
                .iter()
                .map(|tag| (*tag).to_string())
                .collect(),
        })
    }

    /// Ids of agents advertising a capability tag, sorted.
    pub fn find_by_capability(&self, tag: &str) -> Vec<String> {
        let mut ids: Vec<String> = self
            .agents
            .values()
            .filter(|agent| agent.capabilities().contains(&tag))
            .map(|agent| agent.id().to_string())
            .collect();
        ids.sort();
        ids
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

/// Collects agents before freezing them into an [`AgentRegistry`].
#[derive(Default)]
pub struct AgentRegistryBuilder {
    agents: Vec<Arc<dyn Agent>>,
}

impl AgentRegistryBuilder {
    /// Add an agent.
    #[must_use]
    pub fn register(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    /// Freeze the registry, rejecting duplicate ids.
    pub fn build(self) -> Result<AgentRegistry, RegistryError> {
        let mut agents = HashMap::with_capacity(self.agents.len());
        for agent in self.agents {
            let id = agent.id().to_string();
            if agents.contains_key(&id) {
                return Err(RegistryError::Duplicate(id));
            }
            tracing::debug!(agent_id = %id, "Registered agent");
            agents.insert(id, agent);
        }
        Ok(AgentRegistry { agents })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Result;
    use crate::task::Context;
    use async_trait::async_trait;

    struct StubAgent {
        id: &'static str,
        capabilities: &'static [&'static str],
    }

    #[async_trait]
    impl Agent for StubAgent {
        fn id(&self) -> &'static str {
            self.id
        }

        fn description(&self) -> &'static str {
            "stub"
        }

        fn capabilities(&self) -> &'static [&'static str] {
            self.capabilities
        }

        async fn execute(&self, context: &Context) -> Result<Context> {
            Ok(context.clone())
        }
    }

    fn stub(id: &'static str, capabilities: &'static [&'static str]) -> Arc<dyn Agent> {
        Arc::new(StubAgent { id, capabilities })
    }

    #[test]
    fn test_registry_creation() {
        let registry = AgentRegistry::builder().build().unwrap();
        assert!(registry.is_empty());
        assert!(registry.get("anything").is_none());
    }

    #[test]
    fn test_lookup_and_capabilities() {
        let registry = AgentRegistry::builder()
            .register(stub("voting", &["voting", "tally"]))
            .register(stub("narrative_architect", &["narrative_generation"]))
            .build()
            .unwrap();

        assert_eq!(registry.len(), 2);
        assert!(registry.contains("voting"));
        assert_eq!(registry.get("voting").unwrap().id(), "voting");
        assert_eq!(registry.ids(), vec!["narrative_architect", "voting"]);
        assert_eq!(registry.find_by_capability("tally"), vec!["voting"]);
        assert!(registry.find_by_capability("moderation").is_empty());

        let registration = registry.registration("voting").unwrap();
        assert!(registration.capability_tags.contains("tally"));
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let result = AgentRegistry::builder()
            .register(stub("voting", &[]))
            .register(stub("voting", &[]))
            .build();

        assert!(matches!(result, Err(RegistryError::Duplicate(id)) if id == "voting"));
    }
}
