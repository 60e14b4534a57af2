//! Common test utilities for integration tests
//!
//! Provides shared fixtures used across the integration test files:
//! - a seeded in-memory coordination store (and a wrapper recording reads)
//! - a scripted fake compiler agent answering requests
//! - a scripted code generator
//! - hooks recording every callback

#![allow(dead_code)]

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use buildrelay::domain::errors::{GenerationError, StoreError};
use buildrelay::domain::models::{BuildResult, HistoryId, JobOrigin, JobSpec, OriginInfo, StatusRecord};
use buildrelay::domain::ports::{
    CodeGenerator, CoordinationStore, GeneratedCode, JobHooks, Subscription, WatchEvent,
};
use buildrelay::infrastructure::store::{paths, InMemoryStore};
use chrono::Utc;
use serde_json::{json, Value};
use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Setup test logging
///
/// Initializes tracing subscriber for test output.
pub fn setup_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();
}

/// Store holding one live agent `a1`
pub fn seeded_store() -> Arc<InMemoryStore> {
    Arc::new(InMemoryStore::with_data(json!({
        "agents": {
            "a1": {"status": "online", "lastSeenAt": Utc::now().timestamp_millis()}
        }
    })))
}

pub fn job_spec(history_id: Option<&str>) -> JobSpec {
    JobSpec {
        code: "void setup() {}\nvoid loop() {}".to_string(),
        board: "arduino:avr:uno".to_string(),
        libraries: vec!["Servo".to_string()],
        origin: OriginInfo::new(JobOrigin::Pipeline, "client-1"),
        history_id: history_id.map(str::to_string),
    }
}

/// Publish an inline build with a single `bin` file.
pub async fn publish_build(store: &InMemoryStore, build_id: &str, bytes: &[u8]) {
    store
        .write(
            &paths::binary(build_id),
            json!({
                "buildId": build_id,
                "storageKind": "inline",
                "files": {"bin": {"filename": "sketch.ino.bin", "size": bytes.len()}}
            }),
        )
        .await
        .unwrap();
    store
        .write(
            &paths::payload(build_id, buildrelay::FileKind::Bin),
            json!(STANDARD.encode(bytes)),
        )
        .await
        .unwrap();
}

/// Event types written under `logs/{log_id}`, in write order
pub async fn audit_types(store: &InMemoryStore, log_id: &str) -> Vec<String> {
    store
        .read(&paths::logs(log_id))
        .await
        .unwrap()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
        .values()
        .map(|e| e["eventType"].as_str().unwrap_or_default().to_string())
        .collect()
}

/// Request ids submitted to `agent_id`, in submission order
pub async fn submitted_requests(store: &InMemoryStore, agent_id: &str) -> Vec<String> {
    store
        .read(&format!("requests/{agent_id}"))
        .await
        .unwrap()
        .and_then(|v| v.as_object().cloned())
        .unwrap_or_default()
        .keys()
        .cloned()
        .collect()
}

/// Fake compiler agent
///
/// Watches its inbox and answers the n-th request with the n-th script: a
/// list of status records written to `status/{requestId}` in order. Requests
/// beyond the scripts are left unanswered.
pub struct FakeAgent {
    task: JoinHandle<()>,
}

impl FakeAgent {
    pub async fn spawn(store: Arc<InMemoryStore>, agent_id: &str, scripts: Vec<Vec<Value>>) -> Self {
        let mut inbox = store.subscribe(&format!("requests/{agent_id}")).await.unwrap();
        let task = tokio::spawn(async move {
            let mut scripts: VecDeque<Vec<Value>> = scripts.into();
            let mut seen = HashSet::new();

            while let Some(event) = inbox.next().await {
                let WatchEvent::Changed(Some(Value::Object(requests))) = event else {
                    continue;
                };
                for request_id in requests.keys() {
                    if !seen.insert(request_id.clone()) {
                        continue;
                    }
                    let Some(script) = scripts.pop_front() else {
                        continue;
                    };
                    for record in script {
                        tokio::task::yield_now().await;
                        store.write(&paths::status(request_id), record).await.unwrap();
                    }
                }
            }
        });
        Self { task }
    }
}

impl Drop for FakeAgent {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Code generator returning canned responses in order
pub struct ScriptedGenerator {
    responses: Mutex<VecDeque<Result<GeneratedCode, GenerationError>>>,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn new(responses: Vec<Result<GeneratedCode, GenerationError>>) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.into()),
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn fixed_code(code: &str) -> GeneratedCode {
        GeneratedCode {
            code: code.to_string(),
            board: "arduino:avr:uno".to_string(),
            libraries: vec!["Servo".to_string()],
        }
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

#[async_trait]
impl CodeGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        _existing_code: &str,
    ) -> Result<GeneratedCode, GenerationError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Err(GenerationError::Failed("script exhausted".to_string())))
    }
}

/// Hooks recording every callback
#[derive(Default)]
pub struct RecordingHooks {
    pub statuses: Mutex<Vec<StatusRecord>>,
    pub regenerated: Mutex<Vec<GeneratedCode>>,
    pub builds: Mutex<Vec<(Option<String>, BuildResult)>>,
}

impl RecordingHooks {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }
}

#[async_trait]
impl JobHooks for RecordingHooks {
    async fn on_status(&self, record: &StatusRecord) {
        self.statuses.lock().unwrap().push(record.clone());
    }

    async fn on_code_regenerated(&self, code: &GeneratedCode) -> Option<HistoryId> {
        let mut regenerated = self.regenerated.lock().unwrap();
        regenerated.push(code.clone());
        Some(format!("h{}", regenerated.len() + 1))
    }

    async fn on_build_ready(&self, history_id: Option<&str>, build: &BuildResult) {
        self.builds
            .lock()
            .unwrap()
            .push((history_id.map(str::to_string), build.clone()));
    }
}

/// Store wrapper recording every path read
pub struct RecordingStore {
    pub inner: Arc<InMemoryStore>,
    pub reads: Mutex<Vec<String>>,
}

impl RecordingStore {
    pub fn new(inner: Arc<InMemoryStore>) -> Arc<Self> {
        Arc::new(Self {
            inner,
            reads: Mutex::new(Vec::new()),
        })
    }

    pub fn read_paths(&self) -> Vec<String> {
        self.reads.lock().unwrap().clone()
    }
}

#[async_trait]
impl CoordinationStore for RecordingStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        self.reads.lock().unwrap().push(path.to_string());
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.inner.write(path, value).await
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe(path).await
    }
}

/// Store wrapper that stalls reads under `binaries/`
pub struct SlowBinaryStore {
    pub inner: Arc<InMemoryStore>,
    delay: Duration,
    fetching: AtomicBool,
}

impl SlowBinaryStore {
    pub fn new(inner: Arc<InMemoryStore>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            inner,
            delay,
            fetching: AtomicBool::new(false),
        })
    }

    /// A binary read has started
    pub fn fetching(&self) -> bool {
        self.fetching.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CoordinationStore for SlowBinaryStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        if path.starts_with("binaries") {
            self.fetching.store(true, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
        }
        self.inner.read(path).await
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        self.inner.write(path, value).await
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        self.inner.subscribe(path).await
    }
}
