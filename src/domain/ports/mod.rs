//! Port trait definitions (Hexagonal Architecture)
//!
//! Async trait interfaces the orchestrator depends on:
//! - CoordinationStore: shared key-value store with subtree watches
//! - CodeGenerator: natural-language code generation collaborator
//! - JobHooks: UI / persistence callbacks for one job
//!
//! Adapters for the store live in `infrastructure::store`; the generator and
//! hooks are provided by the embedding application.

pub mod code_generator;
pub mod coordination_store;
pub mod job_hooks;

pub use code_generator::{CodeGenerator, GeneratedCode};
pub use coordination_store::{CoordinationStore, Subscription, WatchEvent, WatchSender};
pub use job_hooks::{JobHooks, NoopHooks};
