pub mod agent;
pub mod build;
pub mod config;
pub mod job;
pub mod log_event;
pub mod request;
pub mod status;
pub mod user_log;

pub use agent::{Agent, AgentId, AgentRecord, AgentStatus};
pub use build::{
    Artifact, BinaryMeta, BuildId, BuildInfo, BuildResult, FileEntry, FileKind, StorageKind,
};
pub use config::{
    AgentsConfig, ArtifactsConfig, Config, LogFormat, LoggingConfig, MonitorConfig, RetryConfig,
    RotationPolicy, StoreConfig, StoreKind, StoreTransport,
};
pub use job::{HistoryId, JobOutcome, JobSpec, JobState, MonitorPhase};
pub use log_event::{ClientEventType, ClientLogEvent};
pub use request::{generate_request_id, CompilationRequest, JobOrigin, OriginInfo, RequestId};
pub use status::{JobStatus, StatusRecord};
pub use user_log::{UserLogEntry, UserLogLevel};
