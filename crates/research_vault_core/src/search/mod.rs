//! Free-text search over stored records.
//!
//! # Responsibility
//! - Decide which records match a query and its ticker/tag filters.
//! - Score matches and return them in a deterministic order.
//!
//! # See also
//! - `service::knowledge_base::KnowledgeBase::search`

pub mod ranking;
