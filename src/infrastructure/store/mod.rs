//! Coordination store adapters
//!
//! - `InMemoryStore`: in-process JSON tree (tests, local runs)
//! - `RestStore`: HTTP + server-sent events
//! - `PollingStore`: polling transport over any other adapter

pub mod memory;
pub mod paths;
pub mod polling;
pub mod rest;

pub use memory::InMemoryStore;
pub use polling::PollingStore;
pub use rest::{RestStore, RestStoreConfig};

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;

use crate::domain::models::{StoreConfig, StoreKind, StoreTransport};
use crate::domain::ports::CoordinationStore;

/// Build the store adapter described by the `store` config section
pub fn build_store(config: &StoreConfig) -> Result<Arc<dyn CoordinationStore>> {
    let base: Arc<dyn CoordinationStore> = match config.kind {
        StoreKind::Memory => Arc::new(InMemoryStore::new()),
        StoreKind::Rest => {
            let rest = RestStoreConfig::from_store_config(config)
                .context("store.base_url is required for the rest store")?;
            Arc::new(RestStore::new(rest).context("Failed to build REST store client")?)
        }
    };

    Ok(match config.transport {
        StoreTransport::Push => base,
        StoreTransport::Poll => Arc::new(PollingStore::new(
            base,
            Duration::from_millis(config.poll_interval_ms),
        )),
    })
}
