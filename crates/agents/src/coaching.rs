//! Coaching agent: applies user guidelines to an avatar's personality profile.

use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::agent::{parse_input, to_context, Agent};
use crate::cache::CacheBackend;
use crate::errors::{AgentError, Result};
use crate::locks::KeyedLocks;
use crate::task::Context;

/// Registry id of the coaching agent.
pub const COACHING_AGENT_ID: &str = "coaching";

fn neutral() -> String {
    "neutral".to_string()
}

/// Personality of an AI avatar.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarProfile {
    #[serde(default)]
    pub traits: Vec<String>,
    #[serde(default = "neutral")]
    pub tone: String,
}

impl Default for AvatarProfile {
    fn default() -> Self {
        Self {
            traits: Vec::new(),
            tone: neutral(),
        }
    }
}

/// Changes requested by the avatar's owner.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Guidelines {
    #[serde(default)]
    pub add_traits: Vec<String>,
    #[serde(default)]
    pub remove_traits: Vec<String>,
    #[serde(default)]
    pub set_tone: Option<String>,
}

impl AvatarProfile {
    /// Add missing traits in order, drop removed ones, then set the tone.
    pub fn apply(&mut self, guidelines: &Guidelines) {
        for t in &guidelines.add_traits {
            if !self.traits.contains(t) {
                self.traits.push(t.clone());
            }
        }
        self.traits.retain(|t| !guidelines.remove_traits.contains(t));
        if let Some(tone) = &guidelines.set_tone {
            self.tone.clone_from(tone);
        }
    }
}

#[derive(Debug, Deserialize)]
struct CoachingRequest {
    #[serde(default)]
    avatar_id: String,
    guidelines: Option<Guidelines>,
}

#[derive(Debug, Serialize)]
struct CoachingOutput<'a> {
    avatar_id: &'a str,
    updated_profile: &'a AvatarProfile,
}

/// Stores avatar profiles without expiry.
pub struct CoachingAgent {
    backend: Arc<dyn CacheBackend>,
    locks: KeyedLocks,
}

impl CoachingAgent {
    pub fn new(backend: Arc<dyn CacheBackend>) -> Self {
        Self {
            backend,
            locks: KeyedLocks::new(),
        }
    }

    /// Current profile, or the default for an unknown avatar.
    pub async fn profile(&self, avatar_id: &str) -> Result<AvatarProfile> {
        match self.backend.get(&Self::key(avatar_id)).await? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(AvatarProfile::default()),
        }
    }

    fn key(avatar_id: &str) -> String {
        format!("avatar:{avatar_id}:profile")
    }
}

#[async_trait]
impl Agent for CoachingAgent {
    fn id(&self) -> &'static str {
        COACHING_AGENT_ID
    }

    fn description(&self) -> &'static str {
        "Applies user guidelines to an AI avatar's personality profile"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &["coaching", "avatar_profile"]
    }

    async fn execute(&self, context: &Context) -> Result<Context> {
        let request: CoachingRequest = parse_input(context)?;
        let avatar_id = request.avatar_id.trim();
        if avatar_id.is_empty() {
            return Err(AgentError::validation("avatar_id must not be empty"));
        }
        let guidelines = request
            .guidelines
            .ok_or_else(|| AgentError::validation("guidelines are required"))?;

        let key = Self::key(avatar_id);
        let _guard = self.locks.lock(&key).await;

        let mut profile = self.profile(avatar_id).await?;
        profile.apply(&guidelines);
        self.backend
            .set(&key, serde_json::to_string(&profile)?, None)
            .await?;

        info!(avatar_id, traits = profile.traits.len(), tone = %profile.tone, "Updated avatar profile");
        to_context(&CoachingOutput {
            avatar_id,
            updated_profile: &profile,
        })
    }

    async fn health_check(&self) -> Result<()> {
        Ok(self.backend.ping().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use serde_json::json;

    fn context(value: serde_json::Value) -> Context {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_apply_guidelines() {
        let mut profile = AvatarProfile {
            traits: vec!["curious".into(), "blunt".into()],
            tone: "neutral".into(),
        };
        profile.apply(&Guidelines {
            add_traits: vec!["kind".into(), "curious".into()],
            remove_traits: vec!["blunt".into()],
            set_tone: Some("warm".into()),
        });

        assert_eq!(profile.traits, vec!["curious", "kind"]);
        assert_eq!(profile.tone, "warm");
    }

    #[tokio::test]
    async fn test_profile_persists_between_tasks() {
        let agent = CoachingAgent::new(Arc::new(MemoryCache::new()));

        let first = agent
            .execute(&context(json!({
                "avatar_id": "a1",
                "guidelines": {"add_traits": ["witty"]}
            })))
            .await
            .unwrap();
        assert_eq!(
            first["updated_profile"],
            json!({"traits": ["witty"], "tone": "neutral"})
        );

        let second = agent
            .execute(&context(json!({
                "avatar_id": "a1",
                "guidelines": {"set_tone": "formal"}
            })))
            .await
            .unwrap();
        assert_eq!(second["avatar_id"], json!("a1"));
        assert_eq!(
            second["updated_profile"],
            json!({"traits": ["witty"], "tone": "formal"})
        );
    }

    #[tokio::test]
    async fn test_missing_fields_are_rejected() {
        let backend = Arc::new(MemoryCache::new());
        let agent = CoachingAgent::new(backend.clone());

        for bad in [
            json!({"guidelines": {"add_traits": ["x"]}}),
            json!({"avatar_id": "a1"}),
            json!({"avatar_id": " ", "guidelines": {}}),
        ] {
            let err = agent.execute(&context(bad)).await.unwrap_err();
            assert!(matches!(err, AgentError::Validation(_)));
        }
        assert!(backend.is_empty());
    }
}
