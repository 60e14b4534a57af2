//! Discovery of live compiler agents.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, instrument, warn};

use crate::domain::errors::NoAgentError;
use crate::domain::models::{Agent, AgentId, AgentRecord};
use crate::domain::ports::CoordinationStore;
use crate::infrastructure::store::paths;

/// Registry entry paired with its liveness at lookup time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentListing {
    pub agent: Agent,
    pub live: bool,
}

/// Reads the agent registry and picks an agent to compile on
///
/// Selection is the first live agent in registry order (the order the
/// store returns children in, which is insertion order for both store
/// adapters).
pub struct AgentDirectory {
    store: Arc<dyn CoordinationStore>,
    heartbeat_ttl: chrono::Duration,
}

impl AgentDirectory {
    pub fn new(store: Arc<dyn CoordinationStore>, heartbeat_ttl: Duration) -> Self {
        Self {
            store,
            heartbeat_ttl: chrono::Duration::from_std(heartbeat_ttl)
                .unwrap_or_else(|_| chrono::Duration::seconds(120)),
        }
    }

    /// Every well-formed registry entry with its liveness as of `now`
    pub async fn list_agents_at(
        &self,
        now: DateTime<Utc>,
    ) -> Result<Vec<AgentListing>, NoAgentError> {
        let registry = self
            .store
            .read(paths::AGENTS)
            .await
            .map_err(NoAgentError::RegistryUnavailable)?;

        let Some(serde_json::Value::Object(entries)) = registry else {
            return Ok(Vec::new());
        };

        let listings = entries
            .into_iter()
            .filter_map(|(id, value)| match serde_json::from_value::<AgentRecord>(value) {
                Ok(record) => {
                    let agent = Agent::from_record(id, record);
                    let live = agent.is_live(self.heartbeat_ttl, now);
                    Some(AgentListing { agent, live })
                }
                Err(e) => {
                    warn!(agent_id = %id, error = %e, "skipping malformed agent registry entry");
                    None
                }
            })
            .collect();

        Ok(listings)
    }

    pub async fn list_agents(&self) -> Result<Vec<AgentListing>, NoAgentError> {
        self.list_agents_at(Utc::now()).await
    }

    /// Pick the first live agent
    #[instrument(skip(self))]
    pub async fn find_live_agent(&self) -> Result<AgentId, NoAgentError> {
        let listings = self.list_agents().await?;
        if listings.is_empty() {
            return Err(NoAgentError::NoneRegistered);
        }

        let registered = listings.len();
        let chosen = listings
            .into_iter()
            .find(|listing| listing.live)
            .map(|listing| listing.agent.id)
            .ok_or(NoAgentError::NoneLive { registered })?;

        debug!(agent_id = %chosen, registered, "selected compiler agent");
        Ok(chosen)
    }
}
