//! Voting agent: records community votes on narrative segments.

mod store;

pub use store::{Comment, RetentionPolicy, VoteRecord, VoteStore, VoteType};

use async_trait::async_trait;
use serde::Deserialize;

use crate::agent::{parse_input, to_context, Agent};
use crate::errors::{AgentError, Result};
use crate::task::Context;

/// Registry id of the voting agent.
pub const VOTING_AGENT_ID: &str = "voting";

fn anonymous() -> String {
    "anonymous".to_string()
}

/// A single vote submission.
#[derive(Debug, Clone, Deserialize)]
pub struct VoteRequest {
    pub narrative_id: String,
    pub vote_type: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default = "anonymous")]
    pub user_id: String,
}

impl VoteRequest {
    /// Check the request and split it into the parts the store needs.
    ///
    /// Nothing is written before this succeeds.
    fn validate(self) -> Result<(String, VoteType, Option<Comment>)> {
        if self.narrative_id.trim().is_empty() {
            return Err(AgentError::validation("narrative_id must not be empty"));
        }
        let vote: VoteType = self.vote_type.parse().map_err(AgentError::Validation)?;
        let comment = self
            .comment
            .filter(|c| !c.trim().is_empty())
            .map(|comment| Comment {
                user_id: self.user_id,
                comment,
            });
        Ok((self.narrative_id, vote, comment))
    }
}

/// Records votes and returns the updated tally.
pub struct VotingAgent {
    store: VoteStore,
}

impl VotingAgent {
    pub fn new(store: VoteStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &VoteStore {
        &self.store
    }
}

#[async_trait]
impl Agent for VotingAgent {
    fn id(&self) -> &'static str {
        VOTING_AGENT_ID
    }

    fn description(&self) -> &'static str {
        "Records up/down votes and comments on narrative segments"
    }

    fn capabilities(&self) -> &'static [&'static str] {
        &["voting", "tally", "comments"]
    }

    async fn execute(&self, context: &Context) -> Result<Context> {
        let request: VoteRequest = parse_input(context)?;
        let (narrative_id, vote, comment) = request.validate()?;

        let record = self.store.record(&narrative_id, vote, comment).await?;
        to_context(&record)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(self.store.ping().await?)
    }
}
