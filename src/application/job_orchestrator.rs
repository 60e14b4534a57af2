use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use crate::domain::errors::OrchestratorError;
use crate::domain::models::{
    AgentId, BuildResult, CompilationRequest, Config, HistoryId, JobOutcome, JobSpec, RequestId,
};
use crate::domain::ports::{CodeGenerator, CoordinationStore, JobHooks, NoopHooks};
use crate::services::{
    AgentDirectory, ArtifactFetcher, JobSubmitter, MonitorExit, MonitorOutcome, RetryCoordinator,
    StatusMonitor, UserLog,
};

/// Code, board and libraries of one submission attempt.
#[derive(Debug, Clone)]
struct Attempt {
    code: String,
    board: String,
    libraries: Vec<String>,
    history_id: Option<HistoryId>,
}

/// Drives a compilation job end to end
///
/// Composes discovery, submission, status monitoring, artifact retrieval and
/// bounded retry into one lifecycle:
///
/// 1. pick a live agent
/// 2. submit the request and monitor its status record
/// 3. on `completed`, fetch the preferred artifact and report it through
///    [`JobHooks::on_build_ready`]
/// 4. on `failed`, ask the code generator for a fix and resubmit, at most
///    `retry.max_auto_retries` times
///
/// One job runs at a time per instance. Every error is written to the user
/// log before it is returned.
///
/// # Examples
///
/// ```no_run
/// use buildrelay::application::JobOrchestrator;
/// use buildrelay::domain::models::{Config, JobOrigin, JobSpec, OriginInfo};
/// use buildrelay::infrastructure::store::InMemoryStore;
/// use std::sync::Arc;
///
/// async fn example() -> anyhow::Result<()> {
///     let store = Arc::new(InMemoryStore::new());
///     let orchestrator = JobOrchestrator::builder(store, Config::default()).build()?;
///
///     let outcome = orchestrator
///         .run(JobSpec {
///             code: "void setup() {}\nvoid loop() {}".to_string(),
///             board: "arduino:avr:uno".to_string(),
///             libraries: vec![],
///             origin: OriginInfo::new(JobOrigin::Cli, "local"),
///             history_id: None,
///         })
///         .await?;
///     println!("{} bytes", outcome.artifact.bytes.len());
///     Ok(())
/// }
/// ```
pub struct JobOrchestrator {
    directory: AgentDirectory,
    submitter: JobSubmitter,
    monitor: StatusMonitor,
    fetcher: ArtifactFetcher,
    retry: RetryCoordinator,
    hooks: Arc<dyn JobHooks>,
    user_log: UserLog,
    ack_timeout: Duration,
    run_lock: Mutex<()>,
    current: StdMutex<Option<CancellationToken>>,
}

impl JobOrchestrator {
    pub fn builder(store: Arc<dyn CoordinationStore>, config: Config) -> JobOrchestratorBuilder {
        JobOrchestratorBuilder {
            store,
            config,
            hooks: Arc::new(NoopHooks),
            generator: None,
            user_log: UserLog::new(),
        }
    }

    pub fn user_log(&self) -> &UserLog {
        &self.user_log
    }

    pub fn directory(&self) -> &AgentDirectory {
        &self.directory
    }

    pub fn fetcher(&self) -> &ArtifactFetcher {
        &self.fetcher
    }

    pub fn monitor(&self) -> &StatusMonitor {
        &self.monitor
    }

    /// Run one job to completion.
    #[instrument(skip(self, spec), fields(board = %spec.board, source = %spec.origin.source))]
    pub async fn run(&self, spec: JobSpec) -> Result<JobOutcome, OrchestratorError> {
        let _running = self.run_lock.lock().await;
        let token = CancellationToken::new();
        self.set_current(Some(token.clone()));

        let result = self.execute(spec, &token).await;
        self.set_current(None);

        match &result {
            Ok(outcome) => info!(
                request_id = %outcome.request_id,
                build_id = %outcome.build_id,
                attempts = outcome.attempts,
                "job finished"
            ),
            Err(e) => {
                error!(error = %e, recoverable = e.is_recoverable(), "job failed");
                self.user_log.error(e.to_string());
            }
        }
        result
    }

    /// Abort the running job. Returns `false` when no job was running.
    pub async fn cancel(&self) -> bool {
        let token = self
            .current
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        let Some(token) = token else {
            return false;
        };

        info!("cancelling running job");
        token.cancel();
        self.monitor.cancel().await;
        true
    }

    fn set_current(&self, token: Option<CancellationToken>) {
        *self.current.lock().unwrap_or_else(PoisonError::into_inner) = token;
    }

    async fn execute(
        &self,
        spec: JobSpec,
        token: &CancellationToken,
    ) -> Result<JobOutcome, OrchestratorError> {
        let agent_id = self.directory.find_live_agent().await?;
        self.user_log.info(format!("Using compiler agent {agent_id}"));

        let mut attempt = Attempt {
            code: spec.code,
            board: spec.board,
            libraries: spec.libraries,
            history_id: spec.history_id,
        };
        let mut attempts = 0;

        loop {
            attempts += 1;
            let request = CompilationRequest::new(
                attempt.code.clone(),
                attempt.board.clone(),
                attempt.libraries.clone(),
                spec.origin.clone(),
            );
            if token.is_cancelled() {
                return Err(OrchestratorError::Cancelled {
                    request_id: request.id,
                });
            }

            let (request_id, MonitorOutcome { state, exit }) = self
                .submit_and_monitor(&agent_id, &request, attempt.history_id.clone(), token)
                .await?;

            match exit {
                MonitorExit::Completed(record) => {
                    let build_id = state
                        .build_id
                        .clone()
                        .ok_or_else(|| OrchestratorError::MissingBuildId {
                            request_id: request_id.clone(),
                        })?;

                    self.user_log
                        .info(format!("Build {build_id} finished, fetching binary"));
                    let artifact = tokio::select! {
                        biased;
                        () = token.cancelled() => {
                            return Err(OrchestratorError::Cancelled { request_id });
                        }
                        fetched = self.fetcher.fetch(&build_id) => fetched?,
                    };
                    let build = BuildResult::from(&artifact);
                    self.hooks
                        .on_build_ready(state.history_id.as_deref(), &build)
                        .await;
                    if token.is_cancelled() {
                        return Err(OrchestratorError::Cancelled { request_id });
                    }

                    self.user_log.success(format!(
                        "Compiled {} ({} bytes)",
                        artifact.filename,
                        artifact.bytes.len()
                    ));
                    return Ok(JobOutcome {
                        request_id,
                        build_id,
                        artifact,
                        history_id: state.history_id,
                        attempts,
                        final_status: record,
                    });
                }
                MonitorExit::Failed(record) => {
                    let message = if record.message.trim().is_empty() {
                        "compilation failed".to_string()
                    } else {
                        record.message.clone()
                    };

                    if !self.retry.should_retry(attempts) {
                        return Err(OrchestratorError::RemoteBuildFailure {
                            request_id,
                            message,
                            attempts,
                        });
                    }

                    warn!(
                        request_id = %request_id,
                        attempts,
                        "build failed, retrying with corrected code"
                    );
                    self.user_log.info(format!(
                        "Build failed: {message}. Requesting corrected code (retry {attempts} of {})",
                        self.retry.max_auto_retries()
                    ));

                    let generated = self
                        .retry
                        .regenerate(&message, &attempt.board, &attempt.code)
                        .await?;
                    let history_id = self.hooks.on_code_regenerated(&generated).await;
                    attempt = Attempt {
                        board: if generated.board.is_empty() {
                            attempt.board
                        } else {
                            generated.board
                        },
                        code: generated.code,
                        libraries: generated.libraries,
                        history_id,
                    };
                }
                MonitorExit::TimedOut => {
                    return Err(OrchestratorError::AcknowledgmentTimeout {
                        request_id,
                        timeout_secs: self.ack_timeout.as_secs(),
                    });
                }
                MonitorExit::Cancelled => {
                    return Err(OrchestratorError::Cancelled { request_id });
                }
                MonitorExit::Lost(e) => return Err(e.into()),
            }
        }
    }

    async fn submit_and_monitor(
        &self,
        agent_id: &AgentId,
        request: &CompilationRequest,
        history_id: Option<HistoryId>,
        token: &CancellationToken,
    ) -> Result<(RequestId, MonitorOutcome), OrchestratorError> {
        let request_id = self.submitter.submit(agent_id, request).await?;
        self.user_log
            .info(format!("Submitted request {request_id}, waiting for the agent"));

        let handle = self
            .monitor
            .start(&request_id, request.submitted_at, history_id)
            .await?;
        // cancel() may have run before this monitor existed
        if token.is_cancelled() {
            self.monitor.cancel().await;
        }

        Ok((request_id, handle.wait().await))
    }
}

/// Assembles a [`JobOrchestrator`] from a store and configuration.
pub struct JobOrchestratorBuilder {
    store: Arc<dyn CoordinationStore>,
    config: Config,
    hooks: Arc<dyn JobHooks>,
    generator: Option<Arc<dyn CodeGenerator>>,
    user_log: UserLog,
}

impl JobOrchestratorBuilder {
    pub fn hooks(mut self, hooks: Arc<dyn JobHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    /// Enables automatic retry after a failed build.
    pub fn generator(mut self, generator: Arc<dyn CodeGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    /// Share an existing user log instead of creating a new one.
    pub fn user_log(mut self, user_log: UserLog) -> Self {
        self.user_log = user_log;
        self
    }

    pub fn build(self) -> Result<JobOrchestrator, OrchestratorError> {
        let config = self.config;
        let ack_timeout = Duration::from_secs(config.monitor.ack_timeout_secs);

        let fetcher = ArtifactFetcher::new(
            self.store.clone(),
            config.artifacts.preference.clone(),
            Duration::from_secs(config.artifacts.download_timeout_secs),
        )?;

        Ok(JobOrchestrator {
            directory: AgentDirectory::new(
                self.store.clone(),
                Duration::from_secs(config.agents.heartbeat_ttl_secs),
            ),
            submitter: JobSubmitter::new(self.store.clone()),
            monitor: StatusMonitor::new(
                self.store,
                self.user_log.clone(),
                self.hooks.clone(),
                ack_timeout,
            ),
            fetcher,
            retry: RetryCoordinator::new(self.generator, config.retry.max_auto_retries),
            hooks: self.hooks,
            user_log: self.user_log,
            ack_timeout,
            run_lock: Mutex::new(()),
            current: StdMutex::new(None),
        })
    }
}
