use serde::{Deserialize, Serialize};
use std::fmt;

use super::build::{Artifact, BuildId};
use super::request::{OriginInfo, RequestId};
use super::status::{JobStatus, StatusRecord};

/// Identifier of a version-history entry owned by the persistence layer
pub type HistoryId = String;

/// Per-job bookkeeping owned by a single status monitor task
///
/// A fresh value is created for every submission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JobState {
    pub request_id: RequestId,
    pub log_id: Option<String>,
    pub build_id: Option<BuildId>,
    pub last_observed_status: Option<JobStatus>,
    pub history_id: Option<HistoryId>,
}

impl JobState {
    pub fn new(request_id: impl Into<RequestId>, history_id: Option<HistoryId>) -> Self {
        Self {
            request_id: request_id.into(),
            history_id,
            ..Self::default()
        }
    }
}

/// Lifecycle of one monitored job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MonitorPhase {
    Idle,
    Subscribed,
    Acknowledged,
    Processing,
    Completed,
    Failed,
    TimedOut,
    Cancelled,
}

impl MonitorPhase {
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Completed | Self::Failed | Self::TimedOut | Self::Cancelled
        )
    }
}

impl fmt::Display for MonitorPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Subscribed => "subscribed",
            Self::Acknowledged => "acknowledged",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::TimedOut => "timed_out",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

/// What to compile, as read from the project at job start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub code: String,
    pub board: String,
    pub libraries: Vec<String>,
    pub origin: OriginInfo,
    /// Version-history entry the resulting build should be attached to
    pub history_id: Option<HistoryId>,
}

/// Successful end of a job (after any automatic retry)
#[derive(Debug, Clone, PartialEq)]
pub struct JobOutcome {
    pub request_id: RequestId,
    pub build_id: BuildId,
    pub artifact: Artifact,
    pub history_id: Option<HistoryId>,
    /// Submissions used, including the first
    pub attempts: u32,
    pub final_status: StatusRecord,
}
