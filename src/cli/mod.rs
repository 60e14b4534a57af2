//! Command-line interface
//!
//! Thin surface over the library: every command loads configuration, builds
//! the configured store adapter and calls into the services.

pub mod commands;
pub mod output;
pub mod types;

pub use types::{Cli, Commands};

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

use crate::domain::models::Config;
use crate::domain::ports::CoordinationStore;
use crate::infrastructure::config::ConfigLoader;
use crate::infrastructure::store::build_store;

/// Configuration and store shared by all commands
pub struct CliContext {
    pub config: Config,
    pub store: Arc<dyn CoordinationStore>,
}

impl CliContext {
    pub fn new(config: Config) -> Result<Self> {
        let store = build_store(&config.store).context("Failed to set up coordination store")?;
        Ok(Self { config, store })
    }
}

/// Load configuration from `path`, or from the default locations.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => ConfigLoader::load().context("Failed to load configuration"),
    }
}

/// Print a command failure and exit with a non-zero status.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let causes: Vec<String> = err.chain().skip(1).map(ToString::to_string).collect();
        let body = serde_json::json!({
            "success": false,
            "error": err.to_string(),
            "causes": causes,
        });
        println!(
            "{}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );
    } else {
        eprintln!("{} {err:#}", console::style("Error:").red().bold());
    }
    std::process::exit(1);
}
