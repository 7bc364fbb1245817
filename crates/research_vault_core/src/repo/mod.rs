//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define the per-collection load/save contract.
//! - Isolate file and serialization details from service orchestration.
//!
//! # Invariants
//! - `save` replaces the whole collection atomically.
//! - A never-initialized collection loads as an empty list.

pub mod collection_repo;
