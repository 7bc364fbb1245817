//! Core use-case services.
//!
//! # Responsibility
//! - Orchestrate collection repositories into knowledge-base use-cases.
//! - Keep CLI and embedding callers decoupled from storage details.

pub mod knowledge_base;
