use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Identifier of a registered compiler agent (the key under `agents/`).
pub type AgentId = String;

/// Agent status as reported by the agent process itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Online,
    Offline,
}

impl fmt::Display for AgentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => write!(f, "online"),
            Self::Offline => write!(f, "offline"),
        }
    }
}

impl FromStr for AgentStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "online" => Ok(Self::Online),
            "offline" => Ok(Self::Offline),
            _ => Err(anyhow::anyhow!("Invalid agent status: {s}")),
        }
    }
}

/// Registry entry as stored under `agents/{id}`
///
/// The id is the registry key and is not repeated inside the record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub status: AgentStatus,

    /// Last heartbeat, epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub last_seen_at: DateTime<Utc>,
}

/// A compiler agent known to the coordination store
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Agent {
    /// Registry key
    pub id: AgentId,

    /// Self-reported status
    pub status: AgentStatus,

    /// Last heartbeat timestamp
    pub last_seen_at: DateTime<Utc>,
}

impl Agent {
    pub fn from_record(id: impl Into<AgentId>, record: AgentRecord) -> Self {
        Self {
            id: id.into(),
            status: record.status,
            last_seen_at: record.last_seen_at,
        }
    }

    /// Check if agent heartbeat is older than the threshold
    pub fn is_stale(&self, threshold: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.last_seen_at >= threshold
    }

    /// An agent is live when it says it is online and its heartbeat is fresh.
    pub fn is_live(&self, threshold: chrono::Duration, now: DateTime<Utc>) -> bool {
        self.status == AgentStatus::Online && !self.is_stale(threshold, now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent(status: AgentStatus, seen_secs_ago: i64, now: DateTime<Utc>) -> Agent {
        Agent {
            id: "a1".to_string(),
            status,
            last_seen_at: now - chrono::Duration::seconds(seen_secs_ago),
        }
    }

    #[test]
    fn test_agent_status_from_str() {
        assert_eq!("online".parse::<AgentStatus>().unwrap(), AgentStatus::Online);
        assert_eq!("OFFLINE".parse::<AgentStatus>().unwrap(), AgentStatus::Offline);
        assert!("busy".parse::<AgentStatus>().is_err());
    }

    #[test]
    fn test_liveness_window() {
        let now = Utc::now();
        let ttl = chrono::Duration::seconds(120);

        assert!(agent(AgentStatus::Online, 5, now).is_live(ttl, now));
        assert!(agent(AgentStatus::Online, 119, now).is_live(ttl, now));
        assert!(!agent(AgentStatus::Online, 120, now).is_live(ttl, now));
        assert!(!agent(AgentStatus::Online, 200, now).is_live(ttl, now));
        assert!(!agent(AgentStatus::Offline, 5, now).is_live(ttl, now));
    }

    #[test]
    fn test_record_parses_epoch_millis() {
        let record: AgentRecord = serde_json::from_value(serde_json::json!({
            "status": "online",
            "lastSeenAt": 1_700_000_000_000_i64
        }))
        .unwrap();

        assert_eq!(record.status, AgentStatus::Online);
        assert_eq!(record.last_seen_at.timestamp(), 1_700_000_000);
    }
}
