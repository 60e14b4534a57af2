//! Infrastructure layer module
//!
//! Adapters and ambient concerns behind the domain ports:
//! - Coordination store adapters (in-memory, REST + SSE, polling)
//! - Configuration management (figment)
//! - Logging infrastructure (tracing)

pub mod config;
pub mod logging;
pub mod store;
