use async_trait::async_trait;

use crate::domain::models::{BuildResult, HistoryId, StatusRecord};
use crate::domain::ports::GeneratedCode;

/// Callbacks through which the surrounding application observes a job
///
/// The pipeline UI and the chat UI each provide their own implementation;
/// the orchestrator itself stays UI-agnostic. Every method has a no-op
/// default so implementors only override what they render or persist.
#[async_trait]
pub trait JobHooks: Send + Sync {
    /// Every inbound status record, after normalization
    ///
    /// Runs on the status monitor's task. Calling `cancel` from here is
    /// allowed; the monitor stops after this record is handled.
    async fn on_status(&self, _record: &StatusRecord) {}

    /// New code produced by an automatic fix attempt.
    ///
    /// Returns the id of the version-history entry created for it, which
    /// the retried build will be attached to.
    async fn on_code_regenerated(&self, _code: &GeneratedCode) -> Option<HistoryId> {
        None
    }

    /// A build finished and its artifact was fetched
    async fn on_build_ready(&self, _history_id: Option<&str>, _build: &BuildResult) {}
}

/// Hooks that ignore everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopHooks;

impl JobHooks for NoopHooks {}
