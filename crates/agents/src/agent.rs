//! The execution contract every agent implements.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::errors::{AgentError, Result};
use crate::task::Context;

/// A unit of pluggable logic addressed by a string id.
///
/// Implementations report failures through [`AgentError`]; the orchestrator
/// turns both outcomes into an [`crate::AgentResult`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Identifier tasks use to address this agent.
    fn id(&self) -> &'static str;

    /// Short human-readable summary.
    fn description(&self) -> &'static str;

    /// Capability tags advertised in the registry.
    fn capabilities(&self) -> &'static [&'static str];

    /// Run the agent against a task context.
    async fn execute(&self, context: &Context) -> Result<Context>;

    /// Readiness check used by periodic health checks. Must not mutate state.
    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

/// Deserialize a typed input from a task context.
///
/// Shape mismatches become [`AgentError::Validation`] so that callers see a
/// validation failure rather than a serialization one.
pub fn parse_input<T: DeserializeOwned>(context: &Context) -> Result<T> {
    serde_json::from_value(Value::Object(context.clone()))
        .map_err(|e| AgentError::validation(format!("invalid task context: {e}")))
}

/// Serialize an output value into a context map.
pub fn to_context<T: serde::Serialize>(value: &T) -> Result<Context> {
    match serde_json::to_value(value)? {
        Value::Object(map) => Ok(map),
        other => {
            let mut map = Context::new();
            map.insert("value".to_string(), other);
            Ok(map)
        }
    }
}
