use serde::{Deserialize, Serialize};

use super::build::FileKind;

/// Main configuration structure for buildrelay
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Coordination store connection
    #[serde(default)]
    pub store: StoreConfig,

    /// Agent discovery
    #[serde(default)]
    pub agents: AgentsConfig,

    /// Status monitoring
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Artifact retrieval
    #[serde(default)]
    pub artifacts: ArtifactsConfig,

    /// Automatic fix-and-retry policy
    #[serde(default)]
    pub retry: RetryConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Which store adapter to build
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Rest,
}

/// How subscriptions receive changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreTransport {
    /// Server push (event stream)
    Push,
    /// Periodic reads
    Poll,
}

/// Coordination store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StoreConfig {
    #[serde(default = "default_store_kind")]
    pub kind: StoreKind,

    /// Database root URL for the REST adapter
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Auth token appended as `?auth=` (can also be set via BUILDRELAY_STORE__AUTH_TOKEN)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,

    #[serde(default = "default_transport")]
    pub transport: StoreTransport,

    /// Poll period when `transport` is `poll`
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up reconnecting a dropped event stream after this long
    #[serde(default = "default_reconnect_max_elapsed_secs")]
    pub reconnect_max_elapsed_secs: u64,

    /// HTTP request timeout for reads and writes
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

const fn default_store_kind() -> StoreKind {
    StoreKind::Memory
}

const fn default_transport() -> StoreTransport {
    StoreTransport::Push
}

const fn default_poll_interval_ms() -> u64 {
    3000
}

const fn default_reconnect_max_elapsed_secs() -> u64 {
    60
}

const fn default_request_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: default_store_kind(),
            base_url: None,
            auth_token: None,
            transport: default_transport(),
            poll_interval_ms: default_poll_interval_ms(),
            reconnect_max_elapsed_secs: default_reconnect_max_elapsed_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// Agent discovery configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgentsConfig {
    /// An agent whose heartbeat is older than this is not live
    #[serde(default = "default_heartbeat_ttl_secs")]
    pub heartbeat_ttl_secs: u64,
}

const fn default_heartbeat_ttl_secs() -> u64 {
    120
}

impl Default for AgentsConfig {
    fn default() -> Self {
        Self {
            heartbeat_ttl_secs: default_heartbeat_ttl_secs(),
        }
    }
}

/// Status monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonitorConfig {
    /// Time allowed between submission and the agent's acknowledgment
    #[serde(default = "default_ack_timeout_secs")]
    pub ack_timeout_secs: u64,
}

const fn default_ack_timeout_secs() -> u64 {
    180
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            ack_timeout_secs: default_ack_timeout_secs(),
        }
    }
}

/// Artifact retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ArtifactsConfig {
    /// File kinds to fetch, most preferred first
    #[serde(default = "default_preference")]
    pub preference: Vec<FileKind>,

    /// Timeout for external URL downloads
    #[serde(default = "default_download_timeout_secs")]
    pub download_timeout_secs: u64,
}

fn default_preference() -> Vec<FileKind> {
    vec![FileKind::Bin, FileKind::Hex, FileKind::Elf]
}

const fn default_download_timeout_secs() -> u64 {
    120
}

impl Default for ArtifactsConfig {
    fn default() -> Self {
        Self {
            preference: default_preference(),
            download_timeout_secs: default_download_timeout_secs(),
        }
    }
}

/// Retry policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RetryConfig {
    /// Fix-and-resubmit cycles allowed after a remote build failure
    #[serde(default = "default_max_auto_retries")]
    pub max_auto_retries: u32,
}

const fn default_max_auto_retries() -> u32 {
    1
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_auto_retries: default_max_auto_retries(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Log file rotation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    #[default]
    Daily,
    Hourly,
    Never,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Stdout format
    #[serde(default = "default_log_format")]
    pub format: LogFormat,

    /// Directory for JSON log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    #[serde(default)]
    pub rotation: RotationPolicy,
}

fn default_log_level() -> String {
    "info".to_string()
}

const fn default_log_format() -> LogFormat {
    LogFormat::Pretty
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: RotationPolicy::default(),
        }
    }
}
