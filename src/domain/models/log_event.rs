use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use serde_json::Value;
use std::fmt;

use super::status::JobStatus;

/// Audit event kinds written under `logs/{logId}/`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientEventType {
    RequestSubmitted,
    AcknowledgmentReceived,
    /// Non-terminal status change, rendered `status_update_<status>`
    StatusUpdate(JobStatus),
    JobCompleted,
    JobFailed,
    JobCancelled,
    Timeout,
}

impl fmt::Display for ClientEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RequestSubmitted => write!(f, "request_submitted"),
            Self::AcknowledgmentReceived => write!(f, "acknowledgment_received"),
            Self::StatusUpdate(status) => write!(f, "status_update_{status}"),
            Self::JobCompleted => write!(f, "job_completed"),
            Self::JobFailed => write!(f, "job_failed"),
            Self::JobCancelled => write!(f, "job_cancelled"),
            Self::Timeout => write!(f, "timeout"),
        }
    }
}

impl Serialize for ClientEventType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Audit entry produced by the orchestrator once the agent has assigned a log id
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientLogEvent {
    pub log_id: String,
    pub event_type: ClientEventType,
    pub message: String,
    pub metadata: Value,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub timestamp: DateTime<Utc>,
}

impl ClientLogEvent {
    pub fn new(
        log_id: impl Into<String>,
        event_type: ClientEventType,
        message: impl Into<String>,
        metadata: Value,
        timestamp: DateTime<Utc>,
    ) -> Self {
        Self {
            log_id: log_id.into(),
            event_type,
            message: message.into(),
            metadata,
            timestamp,
        }
    }
}
