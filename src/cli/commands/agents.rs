//! `agents`: show the agent registry.

use anyhow::Result;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::cli::output::{output, CommandOutput, TableFormatter};
use crate::cli::CliContext;
use crate::services::{AgentDirectory, AgentListing};

#[derive(Debug, serde::Serialize)]
pub struct AgentOutput {
    pub id: String,
    pub status: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen_at: DateTime<Utc>,
    pub live: bool,
}

impl From<&AgentListing> for AgentOutput {
    fn from(listing: &AgentListing) -> Self {
        Self {
            id: listing.agent.id.clone(),
            status: listing.agent.status.to_string(),
            last_seen_at: listing.agent.last_seen_at,
            live: listing.live,
        }
    }
}

#[derive(Debug, serde::Serialize)]
pub struct AgentListOutput {
    pub agents: Vec<AgentOutput>,
    pub total: usize,
    pub live: usize,
    #[serde(skip)]
    table: String,
}

impl AgentListOutput {
    pub fn new(listings: &[AgentListing], now: DateTime<Utc>) -> Self {
        Self {
            agents: listings.iter().map(AgentOutput::from).collect(),
            total: listings.len(),
            live: listings.iter().filter(|l| l.live).count(),
            table: TableFormatter::new().format_agents(listings, now),
        }
    }
}

impl CommandOutput for AgentListOutput {
    fn to_human(&self) -> String {
        if self.agents.is_empty() {
            return "No compiler agents registered.".to_string();
        }
        format!("{}\n{} of {} agent(s) live", self.table, self.live, self.total)
    }
}

pub async fn execute(ctx: &CliContext, json_mode: bool) -> Result<()> {
    let directory = AgentDirectory::new(
        ctx.store.clone(),
        Duration::from_secs(ctx.config.agents.heartbeat_ttl_secs),
    );
    let now = Utc::now();
    let listings = directory.list_agents_at(now).await?;

    output(&AgentListOutput::new(&listings, now), json_mode);
    Ok(())
}
