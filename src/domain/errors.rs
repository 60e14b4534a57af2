//! Error taxonomy for the compilation job orchestrator.

use thiserror::Error;

use super::models::{BuildId, FileKind, RequestId};

/// Failures of the coordination store itself
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Permission denied for {path}")]
    PermissionDenied { path: String },

    #[error("Malformed value at {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Subscription to {path} ended: {reason}")]
    SubscriptionClosed { path: String, reason: String },
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<reqwest::Error> for StoreError {
    fn from(err: reqwest::Error) -> Self {
        Self::Unavailable(err.to_string())
    }
}

/// No compiler agent can take the job
#[derive(Debug, Clone, Error)]
pub enum NoAgentError {
    #[error("No compiler agents are registered")]
    NoneRegistered,

    #[error("None of the {registered} registered compiler agents is online")]
    NoneLive { registered: usize },

    #[error("Agent registry unavailable: {0}")]
    RegistryUnavailable(#[source] StoreError),
}

/// Writing the request record failed
#[derive(Debug, Clone, Error)]
#[error("Failed to submit request {request_id} to agent {agent_id}: {source}")]
pub struct SubmissionError {
    pub agent_id: String,
    pub request_id: RequestId,
    #[source]
    pub source: StoreError,
}

/// No fetchable artifact for a build
#[derive(Debug, Clone, Error)]
pub enum NotFoundError {
    #[error("Build {0} has no metadata record")]
    MissingBuild(BuildId),

    #[error("Build {build_id} has no {kind} file")]
    MissingFile { build_id: BuildId, kind: FileKind },

    #[error("Build {build_id} provides none of the requested file kinds")]
    NoKnownKind { build_id: BuildId },

    #[error("Build metadata lookup failed: {0}")]
    Store(#[from] StoreError),
}

/// Retrieving artifact bytes failed
#[derive(Debug, Clone, Error)]
pub enum DownloadError {
    #[error("Artifact metadata unavailable: {0}")]
    Resolve(#[from] NotFoundError),

    #[error("Inline payload for {build_id}/{kind} is missing")]
    MissingPayload { build_id: BuildId, kind: FileKind },

    #[error("Inline payload for {build_id}/{kind} is not valid base64: {reason}")]
    Decode {
        build_id: BuildId,
        kind: FileKind,
        reason: String,
    },

    #[error("HTTP {status} downloading {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("Transfer from {url} failed: {reason}")]
    Transfer { url: String, reason: String },

    #[error("Inline payload read failed: {0}")]
    Store(StoreError),
}

/// The code-generation collaborator failed
#[derive(Debug, Clone, Error)]
pub enum GenerationError {
    #[error("Code generation failed: {0}")]
    Failed(String),

    #[error("Code generation returned no code")]
    Empty,

    #[error("No code generator is configured")]
    Unavailable,
}

/// Everything a job can end with, caught at the orchestrator boundary
#[derive(Debug, Clone, Error)]
pub enum OrchestratorError {
    #[error(transparent)]
    NoAgent(#[from] NoAgentError),

    #[error(transparent)]
    Submission(#[from] SubmissionError),

    #[error("No acknowledgment from the compiler agent for {request_id} within {timeout_secs}s")]
    AcknowledgmentTimeout {
        request_id: RequestId,
        timeout_secs: u64,
    },

    #[error("Remote build of {request_id} failed after {attempts} attempt(s): {message}")]
    RemoteBuildFailure {
        request_id: RequestId,
        message: String,
        attempts: u32,
    },

    #[error("Agent reported {request_id} completed without a build id")]
    MissingBuildId { request_id: RequestId },

    #[error(transparent)]
    NotFound(#[from] NotFoundError),

    #[error(transparent)]
    Download(#[from] DownloadError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error("Job {request_id} was cancelled")]
    Cancelled { request_id: RequestId },

    #[error("Status monitoring failed: {0}")]
    Store(#[from] StoreError),
}

impl OrchestratorError {
    /// Conditions the user can fix by simply trying again later
    pub const fn is_recoverable(&self) -> bool {
        matches!(self, Self::NoAgent(_) | Self::Submission(_))
    }
}
