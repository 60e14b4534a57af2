//! Status monitor: follows one request's status record to a terminal state.
//!
//! Split in two halves:
//! - [`StatusTracker`]: synchronous state machine. Takes status records and
//!   returns the user log lines and audit events each one produces.
//! - [`StatusMonitor`]: owns the subscription, the acknowledgment timer and
//!   the background task driving a tracker. At most one of each is live.

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domain::errors::StoreError;
use crate::domain::models::{
    ClientEventType, ClientLogEvent, HistoryId, JobState, JobStatus, MonitorPhase, RequestId,
    StatusRecord,
};
use crate::domain::ports::{CoordinationStore, JobHooks, Subscription, WatchEvent};
use crate::infrastructure::store::paths;
use crate::services::audit_log::AuditLogger;
use crate::services::user_log::UserLog;

/// Which terminal status a record carried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalStatus {
    Completed,
    Failed,
}

/// Everything one observation produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Step {
    /// Lines for the user log, in display order.
    pub ui_lines: Vec<String>,
    /// Audit events to persist, in write order.
    pub audit: Vec<ClientLogEvent>,
    /// This record was the acknowledgment.
    pub acknowledged: bool,
    pub terminal: Option<TerminalStatus>,
}

impl Step {
    fn ignored() -> Self {
        Self::default()
    }
}

/// Per-job state machine
///
/// `Idle -> Subscribed -> Acknowledged -> Processing* -> Completed | Failed`,
/// with `TimedOut` and `Cancelled` reachable from any non-terminal phase.
/// Once terminal, every further input is ignored.
#[derive(Debug, Clone)]
pub struct StatusTracker {
    state: JobState,
    phase: MonitorPhase,
    submitted_at: DateTime<Utc>,
    history_seen: usize,
}

impl StatusTracker {
    pub fn new(
        request_id: impl Into<RequestId>,
        history_id: Option<HistoryId>,
        submitted_at: DateTime<Utc>,
    ) -> Self {
        Self {
            state: JobState::new(request_id, history_id),
            phase: MonitorPhase::Idle,
            submitted_at,
            history_seen: 0,
        }
    }

    pub fn phase(&self) -> MonitorPhase {
        self.phase
    }

    pub fn state(&self) -> &JobState {
        &self.state
    }

    pub fn into_state(self) -> JobState {
        self.state
    }

    /// The subscription is open.
    pub fn subscribed(&mut self) {
        if self.phase == MonitorPhase::Idle {
            self.phase = MonitorPhase::Subscribed;
        }
    }

    pub fn observe(&mut self, record: &StatusRecord, now: DateTime<Utc>) -> Step {
        if self.phase.is_terminal() {
            return Step::ignored();
        }

        let mut step = Step::default();

        let fresh_history = record.history.get(self.history_seen..).unwrap_or_default();
        step.ui_lines.extend(fresh_history.iter().cloned());
        self.history_seen = self.history_seen.max(record.history.len());
        step.ui_lines.push(record.summary_line());

        if self.state.log_id.is_none() {
            if let Some(log_id) = record.log_id() {
                self.state.log_id = Some(log_id.to_string());
                self.phase = MonitorPhase::Acknowledged;
                step.acknowledged = true;
                step.audit.extend(self.acknowledgment_events(log_id, record, now));
            }
        }

        if self.state.build_id.is_none() {
            self.state.build_id = record.build_id().map(str::to_string);
        }

        if let Some(log_id) = self.state.log_id.clone() {
            if self.state.last_observed_status != Some(record.status) {
                self.state.last_observed_status = Some(record.status);
                step.audit.push(self.status_event(&log_id, record, now));
            }
        }

        match record.status {
            JobStatus::Completed => {
                self.phase = MonitorPhase::Completed;
                step.terminal = Some(TerminalStatus::Completed);
            }
            JobStatus::Failed => {
                self.phase = MonitorPhase::Failed;
                step.terminal = Some(TerminalStatus::Failed);
            }
            JobStatus::Processing if self.state.log_id.is_some() => {
                self.phase = MonitorPhase::Processing;
            }
            _ => {}
        }

        step
    }

    /// The acknowledgment timer fired. Returns the audit event to write, if
    /// there is a log to attach it to.
    pub fn expire(&mut self, timeout: Duration, now: DateTime<Utc>) -> Option<ClientLogEvent> {
        if self.phase.is_terminal() {
            return None;
        }
        self.phase = MonitorPhase::TimedOut;

        let log_id = self.state.log_id.as_deref()?;
        Some(ClientLogEvent::new(
            log_id,
            ClientEventType::Timeout,
            format!("No response within {} seconds", timeout.as_secs()),
            json!({
                "requestId": self.state.request_id,
                "timeoutSeconds": timeout.as_secs(),
            }),
            now,
        ))
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Option<ClientLogEvent> {
        if self.phase.is_terminal() {
            return None;
        }
        self.phase = MonitorPhase::Cancelled;

        let log_id = self.state.log_id.as_deref()?;
        Some(ClientLogEvent::new(
            log_id,
            ClientEventType::JobCancelled,
            "Job cancelled by user",
            json!({
                "requestId": self.state.request_id,
                "lastStatus": self.state.last_observed_status.map(JobStatus::as_str),
            }),
            now,
        ))
    }

    fn acknowledgment_events(
        &self,
        log_id: &str,
        record: &StatusRecord,
        now: DateTime<Utc>,
    ) -> [ClientLogEvent; 2] {
        let latency_ms = (now - self.submitted_at).num_milliseconds().max(0);
        [
            ClientLogEvent::new(
                log_id,
                ClientEventType::RequestSubmitted,
                "Compilation request submitted",
                json!({
                    "requestId": self.state.request_id,
                    "clientId": record.client_id,
                    "submittedAt": self.submitted_at.timestamp_millis(),
                }),
                now,
            ),
            ClientLogEvent::new(
                log_id,
                ClientEventType::AcknowledgmentReceived,
                "Compiler agent acknowledged the request",
                json!({
                    "requestId": self.state.request_id,
                    "latencyMs": latency_ms,
                    "buildId": record.build_id(),
                }),
                now,
            ),
        ]
    }

    fn status_event(&self, log_id: &str, record: &StatusRecord, now: DateTime<Utc>) -> ClientLogEvent {
        let (event_type, metadata) = match record.status {
            JobStatus::Completed => (
                ClientEventType::JobCompleted,
                json!({
                    "buildId": self.state.build_id,
                    "elapsedTime": record.elapsed_time,
                }),
            ),
            JobStatus::Failed => (
                ClientEventType::JobFailed,
                json!({
                    "errorDetails": record.error_details.clone().unwrap_or(Value::Null),
                    "elapsedTime": record.elapsed_time,
                }),
            ),
            status => (
                ClientEventType::StatusUpdate(status),
                json!({
                    "progress": record.progress,
                    "iteration": record.iteration,
                    "elapsedTime": record.elapsed_time,
                }),
            ),
        };
        ClientLogEvent::new(log_id, event_type, record.message.clone(), metadata, now)
    }
}

/// How a monitored job ended.
#[derive(Debug, Clone, PartialEq)]
pub enum MonitorExit {
    Completed(StatusRecord),
    Failed(StatusRecord),
    TimedOut,
    Cancelled,
    /// The subscription broke before a terminal status arrived.
    Lost(StoreError),
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonitorOutcome {
    pub state: JobState,
    pub exit: MonitorExit,
}

/// Caller's side of a running monitor.
#[derive(Debug)]
pub struct MonitorHandle {
    request_id: RequestId,
    outcome: oneshot::Receiver<MonitorOutcome>,
}

impl MonitorHandle {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the job to reach a terminal state.
    pub async fn wait(self) -> MonitorOutcome {
        match self.outcome.await {
            Ok(outcome) => outcome,
            Err(_) => MonitorOutcome {
                state: JobState::new(self.request_id.clone(), None),
                exit: MonitorExit::Lost(StoreError::SubscriptionClosed {
                    path: paths::status(&self.request_id),
                    reason: "monitor task ended without a result".to_string(),
                }),
            },
        }
    }
}

struct ActiveMonitor {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Counts itself in the shared timer gauge while alive.
struct TimerGuard(Arc<AtomicUsize>);

impl TimerGuard {
    fn arm(gauge: &Arc<AtomicUsize>) -> Self {
        gauge.fetch_add(1, Ordering::SeqCst);
        Self(gauge.clone())
    }
}

impl Drop for TimerGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Watches `status/{requestId}` for one job at a time.
pub struct StatusMonitor {
    store: Arc<dyn CoordinationStore>,
    audit: AuditLogger,
    user_log: UserLog,
    hooks: Arc<dyn JobHooks>,
    ack_timeout: Duration,
    active: Mutex<Option<ActiveMonitor>>,
    timers: Arc<AtomicUsize>,
}

impl StatusMonitor {
    pub fn new(
        store: Arc<dyn CoordinationStore>,
        user_log: UserLog,
        hooks: Arc<dyn JobHooks>,
        ack_timeout: Duration,
    ) -> Self {
        Self {
            audit: AuditLogger::new(store.clone()),
            store,
            user_log,
            hooks,
            ack_timeout,
            active: Mutex::new(None),
            timers: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Acknowledgment timers currently armed.
    pub fn active_timers(&self) -> usize {
        self.timers.load(Ordering::SeqCst)
    }

    /// Start following `request_id`, tearing down any previous monitor first.
    pub async fn start(
        &self,
        request_id: &str,
        submitted_at: DateTime<Utc>,
        history_id: Option<HistoryId>,
    ) -> Result<MonitorHandle, StoreError> {
        let mut active = self.active.lock().await;
        if let Some(previous) = active.take() {
            debug!("replacing previous status monitor");
            Self::stop(previous).await;
        }

        let subscription = self.store.subscribe(&paths::status(request_id)).await?;
        let timer = TimerGuard::arm(&self.timers);

        let mut tracker = StatusTracker::new(request_id, history_id, submitted_at);
        tracker.subscribed();

        let cancel = CancellationToken::new();
        let (tx, rx) = oneshot::channel();
        let run = MonitorRun {
            tracker,
            audit: self.audit.clone(),
            user_log: self.user_log.clone(),
            hooks: self.hooks.clone(),
            ack_timeout: self.ack_timeout,
        };
        let task = tokio::spawn(run.drive(subscription, timer, cancel.clone(), tx));

        info!(request_id = %request_id, timeout_secs = self.ack_timeout.as_secs(), "monitoring job status");
        *active = Some(ActiveMonitor { cancel, task });

        Ok(MonitorHandle {
            request_id: request_id.to_string(),
            outcome: rx,
        })
    }

    /// Tear down the live monitor. Returns `false` when nothing was running.
    pub async fn cancel(&self) -> bool {
        let Some(active) = self.active.lock().await.take() else {
            return false;
        };
        let was_running = !active.task.is_finished();
        Self::stop(active).await;
        was_running
    }

    async fn stop(active: ActiveMonitor) {
        active.cancel.cancel();
        // A hook running on the monitor task itself cannot wait for it.
        if tokio::task::try_id() == Some(active.task.id()) {
            debug!("status monitor stopped from its own task");
            return;
        }
        if let Err(e) = active.task.await {
            warn!(error = %e, "status monitor task did not shut down cleanly");
        }
    }
}

/// State moved into the background task.
struct MonitorRun {
    tracker: StatusTracker,
    audit: AuditLogger,
    user_log: UserLog,
    hooks: Arc<dyn JobHooks>,
    ack_timeout: Duration,
}

impl MonitorRun {
    async fn drive(
        mut self,
        mut subscription: Subscription,
        timer: TimerGuard,
        cancel: CancellationToken,
        outcome: oneshot::Sender<MonitorOutcome>,
    ) {
        let deadline = tokio::time::sleep(self.ack_timeout);
        tokio::pin!(deadline);
        let mut timer = Some(timer);

        let exit = loop {
            tokio::select! {
                biased;

                () = cancel.cancelled() => {
                    subscription.unsubscribe();
                    let event = self.tracker.cancel(Utc::now());
                    self.write_audit(event).await;
                    break MonitorExit::Cancelled;
                }

                () = &mut deadline, if timer.is_some() => {
                    timer = None;
                    subscription.unsubscribe();
                    let event = self.tracker.expire(self.ack_timeout, Utc::now());
                    if event.is_none() {
                        warn!(
                            request_id = %self.tracker.state().request_id,
                            "no compiler agent acknowledged the request"
                        );
                    }
                    self.write_audit(event).await;
                    break MonitorExit::TimedOut;
                }

                event = subscription.next() => {
                    let value = match event {
                        Some(WatchEvent::Changed(Some(value))) => value,
                        Some(WatchEvent::Changed(None)) => continue,
                        Some(WatchEvent::Error(e)) => {
                            subscription.unsubscribe();
                            break MonitorExit::Lost(e);
                        }
                        None => {
                            let path = subscription.path().to_string();
                            break MonitorExit::Lost(StoreError::SubscriptionClosed {
                                path,
                                reason: "watch stream ended".to_string(),
                            });
                        }
                    };

                    let record: StatusRecord = match serde_json::from_value(value) {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(error = %e, "ignoring unreadable status record");
                            continue;
                        }
                    };

                    let step = self.tracker.observe(&record, Utc::now());
                    if step.acknowledged {
                        timer = None;
                        info!(
                            request_id = %self.tracker.state().request_id,
                            log_id = ?self.tracker.state().log_id,
                            "job acknowledged"
                        );
                    }
                    for line in &step.ui_lines {
                        self.user_log.info(line.clone());
                    }
                    self.hooks.on_status(&record).await;

                    if let Some(terminal) = step.terminal {
                        subscription.unsubscribe();
                        self.write_all(step.audit).await;
                        break match terminal {
                            TerminalStatus::Completed => MonitorExit::Completed(record),
                            TerminalStatus::Failed => MonitorExit::Failed(record),
                        };
                    }
                    self.write_all(step.audit).await;
                }
            }
        };

        drop(timer);
        debug!(phase = %self.tracker.phase(), "status monitor finished");
        let _ = outcome.send(MonitorOutcome {
            state: self.tracker.into_state(),
            exit,
        });
    }

    async fn write_all(&self, events: Vec<ClientLogEvent>) {
        for event in events {
            self.write_audit(Some(event)).await;
        }
    }

    async fn write_audit(&self, event: Option<ClientLogEvent>) {
        let Some(event) = event else { return };
        if let Err(e) = self.audit.log_event(&event).await {
            warn!(event_type = %event.event_type, error = %e, "failed to write audit event");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ports::NoopHooks;
    use crate::infrastructure::store::{InMemoryStore, PollingStore};

    fn record(value: Value) -> StatusRecord {
        serde_json::from_value(value).unwrap()
    }

    fn event_names(step: &Step) -> Vec<String> {
        step.audit.iter().map(|e| e.event_type.to_string()).collect()
    }

    fn tracker() -> StatusTracker {
        let mut tracker = StatusTracker::new("r1", Some("h1".to_string()), Utc::now());
        tracker.subscribed();
        tracker
    }

    #[test]
    fn test_acknowledgment_then_completion() {
        let mut tracker = tracker();
        let now = Utc::now();

        let step = tracker.observe(
            &record(json!({"status": "processing", "logId": "L1", "progress": 40})),
            now,
        );
        assert!(step.acknowledged);
        assert_eq!(
            event_names(&step),
            vec!["request_submitted", "acknowledgment_received", "status_update_processing"]
        );
        assert_eq!(tracker.phase(), MonitorPhase::Processing);

        let step = tracker.observe(
            &record(json!({"status": "completed", "logId": "L1", "buildId": "B1"})),
            now,
        );
        assert_eq!(event_names(&step), vec!["job_completed"]);
        assert_eq!(step.terminal, Some(TerminalStatus::Completed));
        assert_eq!(tracker.state().build_id.as_deref(), Some("B1"));
    }

    #[test]
    fn test_unchanged_status_emits_nothing() {
        let mut tracker = tracker();
        let now = Utc::now();
        tracker.observe(&record(json!({"status": "processing", "logId": "L1", "progress": 10})), now);

        let step = tracker.observe(
            &record(json!({"status": "processing", "logId": "L1", "progress": 60})),
            now,
        );
        assert!(step.audit.is_empty());
        assert_eq!(step.ui_lines, vec!["[processing] processing (60%)"]);
    }

    #[test]
    fn test_nothing_audited_before_log_id() {
        let mut tracker = tracker();
        let step = tracker.observe(&record(json!({"status": "queued"})), Utc::now());

        assert!(step.audit.is_empty());
        assert!(!step.acknowledged);
        assert_eq!(tracker.phase(), MonitorPhase::Subscribed);
        assert!(tracker.state().last_observed_status.is_none());
    }

    #[test]
    fn test_log_id_is_fixed_once_seen() {
        let mut tracker = tracker();
        let now = Utc::now();
        tracker.observe(&record(json!({"status": "queued", "logId": "L1", "buildId": "B1"})), now);
        let step = tracker.observe(
            &record(json!({"status": "processing", "logId": "L2", "buildId": "B2"})),
            now,
        );

        assert!(!step.acknowledged);
        assert_eq!(step.audit[0].log_id, "L1");
        assert_eq!(tracker.state().log_id.as_deref(), Some("L1"));
        assert_eq!(tracker.state().build_id.as_deref(), Some("B1"));
    }

    #[test]
    fn test_build_id_falls_back_to_terminal_record() {
        let mut tracker = tracker();
        let now = Utc::now();
        tracker.observe(&record(json!({"status": "processing", "logId": "L1"})), now);
        tracker.observe(&record(json!({"status": "completed", "buildId": "B9"})), now);

        assert_eq!(tracker.state().build_id.as_deref(), Some("B9"));
    }

    #[test]
    fn test_terminal_state_ignores_everything() {
        let mut tracker = tracker();
        let now = Utc::now();
        tracker.observe(&record(json!({"status": "failed", "logId": "L1", "message": "boom"})), now);

        let step = tracker.observe(&record(json!({"status": "completed", "logId": "L1"})), now);
        assert_eq!(step, Step::default());
        assert!(tracker.expire(Duration::from_secs(180), now).is_none());
        assert!(tracker.cancel(now).is_none());
        assert_eq!(tracker.phase(), MonitorPhase::Failed);
    }

    #[test]
    fn test_failed_event_carries_error_details() {
        let mut tracker = tracker();
        let step = tracker.observe(
            &record(json!({
                "status": "failed",
                "logId": "L1",
                "message": "expected ';'",
                "errorDetails": {"line": 3}
            })),
            Utc::now(),
        );

        let failed = step.audit.last().unwrap();
        assert_eq!(failed.event_type, ClientEventType::JobFailed);
        assert_eq!(failed.metadata["errorDetails"]["line"], 3);
        assert_eq!(step.terminal, Some(TerminalStatus::Failed));
    }

    #[test]
    fn test_history_lines_surface_once() {
        let mut tracker = tracker();
        let now = Utc::now();
        let first = tracker.observe(
            &record(json!({"status": "processing", "history": ["Installing WiFi"]})),
            now,
        );
        let second = tracker.observe(
            &record(json!({"status": "processing", "history": ["Installing WiFi", "Linking"]})),
            now,
        );

        assert_eq!(first.ui_lines[0], "Installing WiFi");
        assert_eq!(second.ui_lines, vec!["Linking", "[processing] processing (0%)"]);
    }

    #[test]
    fn test_timeout_without_log_id_writes_nothing() {
        let mut tracker = tracker();
        assert!(tracker.expire(Duration::from_secs(180), Utc::now()).is_none());
        assert_eq!(tracker.phase(), MonitorPhase::TimedOut);
    }

    fn monitor(store: Arc<InMemoryStore>, timeout: Duration) -> StatusMonitor {
        StatusMonitor::new(store, UserLog::new(), Arc::new(NoopHooks), timeout)
    }

    async fn audit_types(store: &InMemoryStore, log_id: &str) -> Vec<String> {
        store
            .read(&paths::logs(log_id))
            .await
            .unwrap()
            .and_then(|v| v.as_object().cloned())
            .unwrap_or_default()
            .values()
            .map(|e| e["eventType"].as_str().unwrap().to_string())
            .collect()
    }

    #[tokio::test]
    async fn test_monitor_follows_job_to_completion() {
        let store = Arc::new(InMemoryStore::new());
        let monitor = monitor(store.clone(), Duration::from_secs(180));

        let handle = monitor.start("r1", Utc::now(), None).await.unwrap();
        store
            .write("status/r1", json!({"status": "processing", "logId": "L1", "progress": 40}))
            .await
            .unwrap();
        store
            .write("status/r1", json!({"status": "completed", "logId": "L1", "buildId": "B1"}))
            .await
            .unwrap();

        let outcome = handle.wait().await;
        assert!(matches!(outcome.exit, MonitorExit::Completed(_)));
        assert_eq!(outcome.state.build_id.as_deref(), Some("B1"));
        assert_eq!(
            audit_types(&store, "L1").await,
            vec![
                "request_submitted",
                "acknowledgment_received",
                "status_update_processing",
                "job_completed"
            ]
        );
        assert_eq!(store.subscriber_count("status/r1").await, 0);
        assert_eq!(monitor.active_timers(), 0);
    }

    #[tokio::test]
    async fn test_second_start_leaves_one_subscription_and_timer() {
        let store = Arc::new(InMemoryStore::new());
        let monitor = monitor(store.clone(), Duration::from_secs(180));

        let first = monitor.start("r1", Utc::now(), None).await.unwrap();
        let _second = monitor.start("r1", Utc::now(), None).await.unwrap();

        assert_eq!(first.wait().await.exit, MonitorExit::Cancelled);
        assert_eq!(store.subscriber_count("status/r1").await, 1);
        assert_eq!(monitor.active_timers(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_silence_times_out_once_without_writes() {
        let store = Arc::new(InMemoryStore::new());
        let monitor = monitor(store.clone(), Duration::from_secs(180));
        let before = store.snapshot().await;

        let handle = monitor.start("r1", Utc::now(), None).await.unwrap();
        let outcome = handle.wait().await;

        assert_eq!(outcome.exit, MonitorExit::TimedOut);
        assert_eq!(store.snapshot().await, before);
        assert_eq!(store.subscriber_count("status/r1").await, 0);
        assert_eq!(monitor.active_timers(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_acknowledgment_disarms_timer() {
        let store = Arc::new(InMemoryStore::new());
        let monitor = monitor(store.clone(), Duration::from_secs(180));

        let handle = monitor.start("r1", Utc::now(), None).await.unwrap();
        store
            .write("status/r1", json!({"status": "queued", "logId": "L1"}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(600)).await;
        assert_eq!(monitor.active_timers(), 0);

        store
            .write("status/r1", json!({"status": "completed", "logId": "L1", "buildId": "B1"}))
            .await
            .unwrap();
        assert!(matches!(handle.wait().await.exit, MonitorExit::Completed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_monitor_over_polling_transport() {
        let backing = Arc::new(InMemoryStore::new());
        let polling = Arc::new(PollingStore::new(backing.clone(), Duration::from_secs(1)));
        let monitor = StatusMonitor::new(
            polling,
            UserLog::new(),
            Arc::new(NoopHooks),
            Duration::from_secs(180),
        );

        let handle = monitor.start("r1", Utc::now(), None).await.unwrap();
        backing
            .write("status/r1", json!({"status": "processing", "logId": "L1", "progress": 40}))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(2)).await;
        backing
            .write("status/r1", json!({"status": "completed", "logId": "L1", "buildId": "B1"}))
            .await
            .unwrap();

        let outcome = handle.wait().await;
        assert!(matches!(outcome.exit, MonitorExit::Completed(_)));
        assert_eq!(outcome.state.build_id.as_deref(), Some("B1"));
        assert_eq!(
            audit_types(&backing, "L1").await,
            vec![
                "request_submitted",
                "acknowledgment_received",
                "status_update_processing",
                "job_completed"
            ]
        );
        assert_eq!(backing.total_subscribers().await, 0);
        assert_eq!(monitor.active_timers(), 0);
    }

    /// Hook that cancels the monitor it is attached to.
    #[derive(Default)]
    struct CancelOnStatus {
        monitor: std::sync::OnceLock<std::sync::Weak<StatusMonitor>>,
    }

    #[async_trait::async_trait]
    impl JobHooks for CancelOnStatus {
        async fn on_status(&self, _record: &StatusRecord) {
            if let Some(monitor) = self.monitor.get().and_then(std::sync::Weak::upgrade) {
                monitor.cancel().await;
            }
        }
    }

    #[tokio::test]
    async fn test_hook_can_cancel_its_own_monitor() {
        let store = Arc::new(InMemoryStore::new());
        let hooks = Arc::new(CancelOnStatus::default());
        let monitor = Arc::new(StatusMonitor::new(
            store.clone(),
            UserLog::new(),
            hooks.clone(),
            Duration::from_secs(180),
        ));
        hooks.monitor.set(Arc::downgrade(&monitor)).unwrap();

        let handle = monitor.start("r1", Utc::now(), None).await.unwrap();
        store
            .write("status/r1", json!({"status": "processing", "logId": "L1"}))
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(5), handle.wait())
            .await
            .expect("monitor task must not wait on itself");
        assert_eq!(outcome.exit, MonitorExit::Cancelled);
        assert_eq!(audit_types(&store, "L1").await.last().unwrap(), "job_cancelled");
        assert_eq!(monitor.active_timers(), 0);
    }

    #[tokio::test]
    async fn test_cancel_writes_cancelled_event() {
        let store = Arc::new(InMemoryStore::new());
        let monitor = monitor(store.clone(), Duration::from_secs(180));

        let handle = monitor.start("r1", Utc::now(), None).await.unwrap();
        store
            .write("status/r1", json!({"status": "processing", "logId": "L1"}))
            .await
            .unwrap();
        while audit_types(&store, "L1").await.len() < 3 {
            tokio::task::yield_now().await;
        }

        assert!(monitor.cancel().await);
        assert_eq!(handle.wait().await.exit, MonitorExit::Cancelled);
        assert_eq!(audit_types(&store, "L1").await.last().unwrap(), "job_cancelled");
        assert!(!monitor.cancel().await);
    }
}
