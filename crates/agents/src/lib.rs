//! # Agents
//!
//! Pluggable task handlers for the Storyloom orchestration core.
//!
//! This crate provides:
//! - The [`Agent`] execution contract and the [`Task`]/[`AgentResult`] shapes
//! - A static [`AgentRegistry`] built once at startup
//! - Key/value cache backends with expiry and the narrative [`ContentCache`]
//! - Deterministic content fingerprints
//! - The narrative, voting and coaching agents
//!
//! ## Example
//!
//! ```rust,ignore
//! use agents::{AgentRegistry, MemoryCache, VoteStore, VotingAgent, RetentionPolicy};
//!
//! let backend = Arc::new(MemoryCache::new());
//! let registry = AgentRegistry::builder()
//!     .register(Arc::new(VotingAgent::new(VoteStore::new(backend, RetentionPolicy::default()))))
//!     .build()?;
//! ```

pub mod agent;
pub mod cache;
pub mod coaching;
pub mod errors;
pub mod fingerprint;
pub mod generation;
pub mod locks;
pub mod narrative;
pub mod registry;
pub mod task;
pub mod voting;

pub use agent::Agent;
pub use cache::{CacheBackend, CacheError, ContentCache, MemoryCache};
pub use coaching::{AvatarProfile, CoachingAgent, COACHING_AGENT_ID};
pub use errors::{AgentError, Result};
pub use generation::{AnthropicGenerator, GenerationError, TextGenerator};
pub use locks::KeyedLocks;
pub use narrative::{
    NarrativeAgent, NarrativeConfig, NarrativeInput, NarrativeOption, NarrativeSegment,
    NARRATIVE_AGENT_ID,
};
pub use registry::{AgentRegistration, AgentRegistry, AgentRegistryBuilder, RegistryError};
pub use task::{AgentResult, AgentStatus, Context, Task};
pub use voting::{RetentionPolicy, VoteRecord, VoteStore, VoteType, VotingAgent, VOTING_AGENT_ID};
