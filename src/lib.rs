//! Buildrelay - remote compilation job orchestrator
//!
//! Buildrelay hands source code to a remote compiler agent through a shared
//! coordination store, follows the job's status record to completion and
//! retrieves the resulting binary.
//!
//! # Architecture
//!
//! This crate follows Clean Architecture / Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): models, errors and the ports the core depends on
//! - **Service Layer** (`services`): agent discovery, submission, status
//!   monitoring, artifact retrieval and retry
//! - **Application Layer** (`application`): the job orchestrator composing them
//! - **Infrastructure Layer** (`infrastructure`): store adapters, config, logging
//! - **CLI Layer** (`cli`): command-line interface
//!
//! # Example
//!
//! ```ignore
//! use buildrelay::application::JobOrchestrator;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = buildrelay::ConfigLoader::load()?;
//!     let store = buildrelay::infrastructure::store::build_store(&config.store)?;
//!     let orchestrator = JobOrchestrator::builder(store, config).build()?;
//!     // orchestrator.run(spec).await?
//!     Ok(())
//! }
//! ```

pub mod application;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use application::{JobOrchestrator, JobOrchestratorBuilder};
pub use domain::errors::{
    DownloadError, GenerationError, NoAgentError, NotFoundError, OrchestratorError, StoreError,
    SubmissionError,
};
pub use domain::models::{
    Agent, AgentStatus, Artifact, BuildInfo, ClientEventType, ClientLogEvent, CompilationRequest,
    Config, FileKind, JobOrigin, JobOutcome, JobSpec, JobState, JobStatus, MonitorPhase,
    OriginInfo, StatusRecord,
};
pub use domain::ports::{CodeGenerator, CoordinationStore, GeneratedCode, JobHooks, NoopHooks};
pub use infrastructure::config::{ConfigError, ConfigLoader};
pub use services::{StatusMonitor, UserLog};
