//! Core domain logic for the personal research knowledge base.
//! This crate is the single source of truth for record invariants.

pub mod config;
pub mod logging;
pub mod model;
pub mod repo;
pub mod search;
pub mod service;

pub use config::{KnowledgeBaseConfig, ReadFailurePolicy};
pub use logging::{default_log_level, init_logging, init_logging_from_env, logging_status};
pub use model::record::{
    NewRecord, Record, RecordId, RecordKind, RecordPatch, RecordValidationError,
};
pub use repo::collection_repo::{
    CollectionRepository, JsonFileCollection, MemoryCollection, RepoError, RepoResult,
};
pub use search::ranking::{Scope, SearchHit, SearchQuery};
pub use service::knowledge_base::{KbError, KbResult, KnowledgeBase};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
