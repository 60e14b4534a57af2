//! CLI command implementations.

pub mod agents;
pub mod compile;
pub mod fetch;
pub mod status;
