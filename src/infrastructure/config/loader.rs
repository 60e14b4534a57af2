use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use std::collections::HashSet;
use thiserror::Error;

use crate::domain::models::config::{Config, StoreKind};

/// Upper bound on automatic fix-and-retry cycles
const MAX_AUTO_RETRIES_LIMIT: u32 = 5;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("store.base_url is required when store.kind is rest")]
    MissingStoreUrl,

    #[error("Invalid {field}: must be greater than 0")]
    ZeroDuration { field: &'static str },

    #[error("artifacts.preference cannot be empty")]
    EmptyArtifactPreference,

    #[error("artifacts.preference lists {0} more than once")]
    DuplicateArtifactKind(String),

    #[error("Invalid max_auto_retries: {0}. Must be at most {MAX_AUTO_RETRIES_LIMIT}")]
    TooManyRetries(u32),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .buildrelay/config.yaml (project config)
    /// 3. .buildrelay/local.yaml (local overrides, optional)
    /// 4. Environment variables (BUILDRELAY_* prefix, `__` for nesting)
    pub fn load() -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(".buildrelay/config.yaml"))
            .merge(Yaml::file(".buildrelay/local.yaml"))
            .merge(Env::prefixed("BUILDRELAY_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file, still honouring env overrides
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("BUILDRELAY_").split("__"))
            .extract()
            .context(format!(
                "Failed to load config from {}",
                path.as_ref().display()
            ))?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.store.kind == StoreKind::Rest
            && config.store.base_url.as_deref().is_none_or(str::is_empty)
        {
            return Err(ConfigError::MissingStoreUrl);
        }

        let durations = [
            ("store.poll_interval_ms", config.store.poll_interval_ms),
            ("store.request_timeout_secs", config.store.request_timeout_secs),
            ("agents.heartbeat_ttl_secs", config.agents.heartbeat_ttl_secs),
            ("monitor.ack_timeout_secs", config.monitor.ack_timeout_secs),
            (
                "artifacts.download_timeout_secs",
                config.artifacts.download_timeout_secs,
            ),
        ];
        if let Some((field, _)) = durations.iter().find(|(_, value)| *value == 0) {
            return Err(ConfigError::ZeroDuration { field });
        }

        if config.artifacts.preference.is_empty() {
            return Err(ConfigError::EmptyArtifactPreference);
        }
        let mut seen = HashSet::new();
        for kind in &config.artifacts.preference {
            if !seen.insert(*kind) {
                return Err(ConfigError::DuplicateArtifactKind(kind.to_string()));
            }
        }

        if config.retry.max_auto_retries > MAX_AUTO_RETRIES_LIMIT {
            return Err(ConfigError::TooManyRetries(config.retry.max_auto_retries));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.to_lowercase().as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        Ok(())
    }
}
