//! Narrative Architect agent.
//!
//! Turns story state, character profiles and a trigger event into the next
//! story segment plus the choices the community votes on. Generation results
//! are memoized in the [`ContentCache`] under a fingerprint of the input, and
//! concurrent requests for the same fingerprint share one generation call.

mod parser;
mod prompt;

pub use parser::parse_segment;
pub use prompt::build_prompt;

use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::agent::{parse_input, to_context, Agent};
use crate::cache::ContentCache;
use crate::errors::{AgentError, Result};
use crate::fingerprint::fingerprint;
use crate::generation::{GenerationError, TextGenerator};
use crate::locks::KeyedLocks;
use crate::task::Context;

/// Registry id of the narrative agent.
pub const NARRATIVE_AGENT_ID: &str = "narrative_architect";

/// Generation input. All three fields take part in the fingerprint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NarrativeInput {
    #[serde(default)]
    pub story_state: Context,
    #[serde(default)]
    pub character_profiles: Vec<Value>,
    pub trigger_event: String,
}

/// One votable choice.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeOption {
    pub id: u32,
    pub text: String,
}

/// A generated story segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NarrativeSegment {
    pub text: String,
    pub options: Vec<NarrativeOption>,
}

impl NarrativeSegment {
    /// Option texts in option order.
    pub fn next_possible_actions(&self) -> Vec<String> {
        self.options.iter().map(|o| o.text.clone()).collect()
    }
}

#[derive(Debug, Serialize)]
struct NarrativeOutput<'a> {
    segment: &'a NarrativeSegment,
    next_possible_actions: Vec<String>,
    fingerprint: &'a str,
    cached: bool,
}

/// Tunables for [`NarrativeAgent`].
#[derive(Debug, Clone)]
pub struct NarrativeConfig {
    /// Deadline for a single generation call
    pub generation_timeout: Duration,
    /// Upper bound on options kept from one generation
    pub max_options: usize,
}

impl Default for NarrativeConfig {
    fn default() -> Self {
        Self {
            generation_timeout: Duration::from_secs(30),
            max_options: 5,
        }
    }
}

/// Cache-first narrative generator.
pub struct NarrativeAgent {
    generator: Arc<dyn TextGenerator>,
    cache: ContentCache,
    in_flight: KeyedLocks,
    config: NarrativeConfig,
}

impl NarrativeAgent {
    pub fn new(generator: Arc<dyn TextGenerator>, cache: ContentCache) -> Self {
        Self {
            generator,
            cache,
            in_flight: KeyedLocks::new(),
            config: NarrativeConfig::default(),
        }
    }

    #[must_use]
    pub fn with_config(mut self, config: NarrativeConfig) -> Self {
        self.config = config;
        self
    }

    pub fn config(&self) -> &NarrativeConfig {
        &self.config
    }

    /// Produce a segment for `input`, returning it with a cache-hit flag.
    pub async fn narrate(&self, input: &NarrativeInput) -> Result<(String, NarrativeSegment, bool)> {
        let key = fingerprint(input)?;
        let _guard = self.in_flight.lock(&key).await;

        // A failing cache read degrades to generation.
        match self.cache.get(&key).await {
            Ok(Some(segment)) => {
                debug!(fingerprint = %key, "Narrative cache hit");
                return Ok((key, segment, true));
            }
            Ok(None) => debug!(fingerprint = %key, "Narrative cache miss"),
            Err(e) => warn!(fingerprint = %key, error = %e, "Narrative cache read failed, generating anyway"),
        }

        let segment = self.generate(input).await?;

        if let Err(e) = self.cache.put(&key, &segment).await {
            warn!(fingerprint = %key, error = %e, "Failed to cache narrative segment");
        }

        Ok((key, segment, false))
    }

    async fn generate(&self, input: &NarrativeInput) -> Result<NarrativeSegment> {
        let prompt = build_prompt(input, self.config.max_options);
        let timeout = self.config.generation_timeout;
        let started = Instant::now();

        let raw = tokio::time::timeout(timeout, self.generator.generate(&prompt))
            .await
            .map_err(|_| GenerationError::Timeout(timeout))??;

        let segment = parse_segment(&raw, self.config.max_options)?;
        info!(
            backend = self.generator.name(),
            options = segment.options.len(),
            duration_ms = started.elapsed().as_millis(),
            "Generated narrative segment"
        );
        Ok(segment)
    }
}

#[async_trait]
impl Agent for NarrativeAgent {
    fn id(&self) -> &'static str {
        NARRATIVE_AGENT_ID
    }

    fn description(&self) -> &'static str {
        "Generates the next story segment and its votable choices"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &["narrative_generation", "content_cache"]
    }

    async fn execute(&self, context: &Context) -> Result<Context> {
        let input: NarrativeInput = parse_input(context)?;
        if input.trigger_event.trim().is_empty() {
            return Err(AgentError::validation("trigger_event must not be empty"));
        }

        let (key, segment, cached) = self.narrate(&input).await?;
        to_context(&NarrativeOutput {
            next_possible_actions: segment.next_possible_actions(),
            segment: &segment,
            fingerprint: &key,
            cached,
        })
    }

    /// Ready when the generation backend is. Cache outages only degrade this agent.
    async fn health_check(&self) -> Result<()> {
        if self.generator.is_ready() {
            Ok(())
        } else {
            Err(GenerationError::NotConfigured(format!(
                "{} backend has no credentials",
                self.generator.name()
            ))
            .into())
        }
    }
}
