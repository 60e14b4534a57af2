use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Identifier of a single compilation job (one submission).
pub type RequestId = String;

/// Which surface started the job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobOrigin {
    /// Step-by-step build pipeline UI
    Pipeline,
    /// Conversational UI
    Chat,
    /// Command line
    Cli,
}

impl fmt::Display for JobOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pipeline => write!(f, "pipeline"),
            Self::Chat => write!(f, "chat"),
            Self::Cli => write!(f, "cli"),
        }
    }
}

/// Where a request came from, attached to the request record for the agent's benefit
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginInfo {
    pub source: JobOrigin,

    /// Stable id of the submitting client instance
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
}

impl OriginInfo {
    pub fn new(source: JobOrigin, client_id: impl Into<String>) -> Self {
        Self {
            source,
            client_id: client_id.into(),
            project_id: None,
        }
    }

    #[must_use]
    pub fn with_project(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }
}

/// Request record written under `requests/{agentId}/{requestId}`
///
/// Immutable once written.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompilationRequest {
    pub id: RequestId,

    /// Sketch source code
    pub code: String,

    /// Fully qualified board name, e.g. `esp32:esp32:esp32`
    pub board: String,

    /// Library names in install order
    #[serde(default)]
    pub libraries: Vec<String>,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub submitted_at: DateTime<Utc>,

    pub origin_info: OriginInfo,
}

impl CompilationRequest {
    /// Build a request with a freshly generated id
    pub fn new(
        code: impl Into<String>,
        board: impl Into<String>,
        libraries: Vec<String>,
        origin_info: OriginInfo,
    ) -> Self {
        let submitted_at = Utc::now();
        Self {
            id: generate_request_id(submitted_at),
            code: code.into(),
            board: board.into(),
            libraries,
            submitted_at,
            origin_info,
        }
    }
}

/// Request ids are `req_<epoch millis>_<random suffix>`.
///
/// The millisecond prefix keeps ids roughly time ordered in the store; the
/// uuid suffix makes same-millisecond collisions practically impossible.
pub fn generate_request_id(at: DateTime<Utc>) -> RequestId {
    let suffix = Uuid::new_v4().simple().to_string();
    format!("req_{}_{}", at.timestamp_millis(), &suffix[..12])
}
