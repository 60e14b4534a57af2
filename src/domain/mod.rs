//! Domain layer for buildrelay
//!
//! Models of agents, requests, status records and builds; the error
//! taxonomy; and the ports the orchestrator talks through.

pub mod errors;
pub mod models;
pub mod ports;

pub use errors::{
    DownloadError, GenerationError, NoAgentError, NotFoundError, OrchestratorError, StoreError,
    SubmissionError,
};
