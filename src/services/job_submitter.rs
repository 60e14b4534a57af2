//! Writes compilation requests into an agent's inbox.

use std::sync::Arc;
use tracing::{info, instrument};

use crate::domain::errors::{StoreError, SubmissionError};
use crate::domain::models::{CompilationRequest, RequestId};
use crate::domain::ports::CoordinationStore;
use crate::infrastructure::store::paths;

/// Single-write submission of a [`CompilationRequest`]
///
/// Failures are reported, never retried here.
pub struct JobSubmitter {
    store: Arc<dyn CoordinationStore>,
}

impl JobSubmitter {
    pub fn new(store: Arc<dyn CoordinationStore>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, request), fields(request_id = %request.id, board = %request.board))]
    pub async fn submit(
        &self,
        agent_id: &str,
        request: &CompilationRequest,
    ) -> Result<RequestId, SubmissionError> {
        let fail = |source: StoreError| SubmissionError {
            agent_id: agent_id.to_string(),
            request_id: request.id.clone(),
            source,
        };

        let value = serde_json::to_value(request).map_err(|e| fail(e.into()))?;
        self.store
            .write(&paths::request(agent_id, &request.id), value)
            .await
            .map_err(fail)?;

        info!(agent_id = %agent_id, libraries = request.libraries.len(), "request submitted");
        Ok(request.id.clone())
    }
}
