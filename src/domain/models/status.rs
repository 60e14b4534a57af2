use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// Job status values written by the agent to `status/{requestId}`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    #[serde(alias = "pending", alias = "received")]
    Queued,
    #[serde(alias = "compiling", alias = "building")]
    Processing,
    #[serde(alias = "success")]
    Completed,
    #[serde(alias = "error")]
    Failed,
}

impl JobStatus {
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "queued",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status record for one request, overwritten in place by the agent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusRecord {
    pub status: JobStatus,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phase: Option<String>,

    /// Percent complete, 0-100
    #[serde(default)]
    pub progress: f64,

    #[serde(default)]
    pub message: String,

    /// Audit log id, assigned once by the agent on acceptance
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_id: Option<String>,

    /// Build id, assigned once by the agent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iteration: Option<u32>,

    /// Seconds since the agent picked up the job
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_time: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_details: Option<Value>,

    /// Earlier progress messages, oldest first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub history: Vec<String>,
}

impl StatusRecord {
    pub fn new(status: JobStatus) -> Self {
        Self {
            status,
            phase: None,
            progress: 0.0,
            message: String::new(),
            log_id: None,
            build_id: None,
            client_id: None,
            iteration: None,
            elapsed_time: None,
            error_details: None,
            history: Vec::new(),
        }
    }

    /// Non-empty log id, if any
    pub fn log_id(&self) -> Option<&str> {
        self.log_id.as_deref().filter(|id| !id.is_empty())
    }

    /// Non-empty build id, if any
    pub fn build_id(&self) -> Option<&str> {
        self.build_id.as_deref().filter(|id| !id.is_empty())
    }

    /// One-line rendering for the user log: `[phase] status (progress%) - message`
    pub fn summary_line(&self) -> String {
        let phase = self.phase.as_deref().unwrap_or(self.status.as_str());
        let progress = self.progress.clamp(0.0, 100.0);
        if self.message.is_empty() {
            format!("[{phase}] {} ({progress:.0}%)", self.status)
        } else {
            format!("[{phase}] {} ({progress:.0}%) - {}", self.status, self.message)
        }
    }
}
