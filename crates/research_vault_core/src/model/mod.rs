//! Domain model for stored research records.
//!
//! # Responsibility
//! - Define the canonical record shared by note/article/research collections.
//! - Own creation drafts, typed partial updates and their validation rules.
//!
//! # Invariants
//! - Every record is identified by a stable `RecordId`.
//! - A record's kind never changes after creation.
//! - Deletion is a hard removal; there are no tombstones.

pub mod record;
