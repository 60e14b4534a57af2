pub mod agent_directory;
pub mod artifact_fetcher;
pub mod audit_log;
pub mod job_submitter;
pub mod retry_coordinator;
pub mod status_monitor;
pub mod user_log;

pub use agent_directory::{AgentDirectory, AgentListing};
pub use artifact_fetcher::ArtifactFetcher;
pub use audit_log::AuditLogger;
pub use job_submitter::JobSubmitter;
pub use retry_coordinator::RetryCoordinator;
pub use status_monitor::{
    MonitorExit, MonitorHandle, MonitorOutcome, StatusMonitor, StatusTracker, Step,
    TerminalStatus,
};
pub use user_log::UserLog;
