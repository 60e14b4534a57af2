//! HTTP adapter for a realtime-database style REST API.
//!
//! - `GET  {base}/{path}.json` reads a subtree (`null` when absent)
//! - `PUT  {base}/{path}.json` replaces it (`null` deletes)
//! - `GET` with `Accept: text/event-stream` streams `put`/`patch` events
//!   for the subtree; every change event triggers a fresh read of the
//!   watched path so subscribers always see the whole current value.

use async_trait::async_trait;
use backoff::ExponentialBackoff;
use futures::StreamExt;
use reqwest::{header, Client, RequestBuilder, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::errors::StoreError;
use crate::domain::models::StoreConfig;
use crate::domain::ports::{CoordinationStore, Subscription, WatchEvent, WatchSender};

/// Configuration for the REST store client
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Database root, e.g. `https://example-default-rtdb.firebaseio.com`
    pub base_url: String,
    pub auth_token: Option<String>,
    /// Timeout for plain reads and writes (event streams are unbounded)
    pub request_timeout: Duration,
    /// Stop reconnecting a dropped event stream after this long
    pub reconnect_max_elapsed: Duration,
}

impl RestStoreConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            auth_token: None,
            request_timeout: Duration::from_secs(30),
            reconnect_max_elapsed: Duration::from_secs(60),
        }
    }

    /// Build from the `store` config section; `None` when no base url is set
    pub fn from_store_config(config: &StoreConfig) -> Option<Self> {
        Some(Self {
            base_url: config.base_url.clone()?,
            auth_token: config.auth_token.clone(),
            request_timeout: Duration::from_secs(config.request_timeout_secs),
            reconnect_max_elapsed: Duration::from_secs(config.reconnect_max_elapsed_secs),
        })
    }
}

/// Coordination store backed by HTTP
#[derive(Clone)]
pub struct RestStore {
    /// Client with a request timeout for reads/writes
    http_client: Client,
    /// Client without a timeout for long-lived event streams
    stream_client: Client,
    base_url: String,
    auth_token: Option<String>,
    reconnect_max_elapsed: Duration,
}

impl RestStore {
    pub fn new(config: RestStoreConfig) -> Result<Self, StoreError> {
        let http_client = Client::builder()
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(10)
            .tcp_nodelay(true)
            .build()?;
        let stream_client = Client::builder().tcp_nodelay(true).build()?;

        Ok(Self {
            http_client,
            stream_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token,
            reconnect_max_elapsed: config.reconnect_max_elapsed,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}.json", self.base_url, path.trim_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth_token.as_deref() {
            Some(token) => request.query(&[("auth", token)]),
            None => request,
        }
    }

    fn status_error(path: &str, status: StatusCode) -> StoreError {
        match status {
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => StoreError::PermissionDenied {
                path: path.to_string(),
            },
            other => StoreError::Unavailable(format!("HTTP {other} for {path}")),
        }
    }

    async fn open_stream(&self, path: &str) -> Result<Response, backoff::Error<StoreError>> {
        let response = self
            .authorize(self.stream_client.get(self.url(path)))
            .header(header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| backoff::Error::transient(StoreError::from(e)))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let err = Self::status_error(path, status);
        if matches!(err, StoreError::PermissionDenied { .. }) {
            Err(backoff::Error::permanent(err))
        } else {
            Err(backoff::Error::transient(err))
        }
    }

    fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff {
            max_elapsed_time: Some(self.reconnect_max_elapsed),
            ..ExponentialBackoff::default()
        }
    }

    /// Read `path` after a change event, retrying transient failures.
    async fn reread(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let store = self;
        backoff::future::retry_notify(
            self.retry_policy(),
            move || async move {
                store.read(path).await.map_err(|err| match err {
                    StoreError::PermissionDenied { .. } => backoff::Error::permanent(err),
                    other => backoff::Error::transient(other),
                })
            },
            |err: StoreError, delay: Duration| {
                warn!(
                    path = %path,
                    error = %err,
                    retry_in_ms = delay.as_millis() as u64,
                    "re-read after change event failed"
                );
            },
        )
        .await
    }

    /// Forward change events from one connected stream.
    ///
    /// `Ok(())` means the connection dropped and may be reopened.
    async fn pump(
        &self,
        path: &str,
        response: Response,
        sender: &WatchSender,
        last: &mut Option<Option<Value>>,
    ) -> Result<(), StoreError> {
        let mut parser = SseParser::default();
        let mut body = response.bytes_stream();

        while let Some(chunk) = body.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    debug!(path = %path, error = %e, "event stream read failed");
                    return Ok(());
                }
            };

            for event in parser.push(&chunk) {
                match event.name.as_str() {
                    "put" | "patch" => {
                        let current = self.reread(path).await?;
                        if last.as_ref() != Some(&current) {
                            if !sender.send(WatchEvent::Changed(current.clone())) {
                                return Ok(());
                            }
                            *last = Some(current);
                        }
                    }
                    "keep-alive" => {}
                    "cancel" | "auth_revoked" => {
                        return Err(StoreError::PermissionDenied {
                            path: path.to_string(),
                        });
                    }
                    other => debug!(path = %path, event = %other, "ignoring stream event"),
                }
            }
        }

        Ok(())
    }

    async fn watch(self, path: String, sender: WatchSender) {
        let mut last = None;
        let result: Result<(), StoreError> = async {
            loop {
                let response = backoff::future::retry_notify(
                    self.retry_policy(),
                    || self.open_stream(&path),
                    |err: StoreError, delay: Duration| {
                        warn!(
                            path = %path,
                            error = %err,
                            retry_in_ms = delay.as_millis() as u64,
                            "event stream connect failed"
                        );
                    },
                )
                .await?;

                self.pump(&path, response, &sender, &mut last).await?;
                debug!(path = %path, "event stream dropped, reconnecting");
            }
        }
        .await;

        if let Err(err) = result {
            sender.send(WatchEvent::Error(err));
        }
    }
}

#[async_trait]
impl CoordinationStore for RestStore {
    async fn read(&self, path: &str) -> Result<Option<Value>, StoreError> {
        let response = self
            .authorize(self.http_client.get(self.url(path)))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(path, status));
        }

        let value: Value = response.json().await.map_err(|e| StoreError::Malformed {
            path: path.to_string(),
            reason: e.to_string(),
        })?;
        Ok((!value.is_null()).then_some(value))
    }

    async fn write(&self, path: &str, value: Value) -> Result<(), StoreError> {
        let response = self
            .authorize(self.http_client.put(self.url(path)))
            .json(&value)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(Self::status_error(path, status));
        }
        Ok(())
    }

    async fn subscribe(&self, path: &str) -> Result<Subscription, StoreError> {
        let (sender, subscription) = Subscription::channel(path);
        let store = self.clone();
        let path = path.to_string();

        tokio::spawn(async move {
            let closed = sender.clone();
            tokio::select! {
                () = closed.closed() => debug!(path = %path, "event stream unsubscribed"),
                () = store.watch(path.clone(), sender) => {}
            }
        });

        Ok(subscription)
    }
}

/// One server-sent event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub name: String,
    pub data: String,
}

/// Incremental `text/event-stream` decoder
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
}

impl SseParser {
    /// Feed raw bytes, returning every event completed by them
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseEvent> {
        self.buf.extend(chunk.iter().copied().filter(|b| *b != b'\r'));

        let mut events = Vec::new();
        while let Some(end) = self.buf.windows(2).position(|w| w == b"\n\n") {
            let block: Vec<u8> = self.buf.drain(..end + 2).collect();
            if let Some(event) = Self::parse_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
        }
        events
    }

    fn parse_block(block: &str) -> Option<SseEvent> {
        let mut name = None;
        let mut data = Vec::new();
        for line in block.lines() {
            if let Some(value) = line.strip_prefix("event:") {
                name = Some(value.trim().to_string());
            } else if let Some(value) = line.strip_prefix("data:") {
                data.push(value.trim_start().to_string());
            }
        }
        if name.is_none() && data.is_empty() {
            return None;
        }
        Some(SseEvent {
            name: name.unwrap_or_else(|| "message".to_string()),
            data: data.join("\n"),
        })
    }
}
