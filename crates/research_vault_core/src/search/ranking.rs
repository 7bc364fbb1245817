//! Substring matching and relevance ranking.
//!
//! # Responsibility
//! - Filter records by literal query text, ticker and tags.
//! - Score each match from per-term field hits plus a recency bonus.
//!
//! # Invariants
//! - Matching is case-insensitive and treats the whole query as one literal.
//! - Scoring splits the query into whitespace-delimited terms; each term
//!   counts at most once per field.
//! - Ordering is by descending score; ties keep discovery order.
//! - A malformed `created_at` yields no recency bonus and never fails.

use crate::model::record::{Record, RecordKind};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

pub const TITLE_WEIGHT: f64 = 3.0;
pub const CONTENT_WEIGHT: f64 = 1.0;
pub const SUMMARY_WEIGHT: f64 = 1.5;
pub const RECENT_BONUS: f64 = 0.5;
pub const AGING_BONUS: f64 = 0.2;
const RECENT_WINDOW_DAYS: i64 = 30;
const AGING_WINDOW_DAYS: i64 = 90;

/// Which collections an operation covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Notes, then articles, then research.
    #[default]
    All,
    Only(RecordKind),
}

impl Scope {
    /// Kinds covered by this scope, in fixed collection order.
    pub fn kinds(self) -> Vec<RecordKind> {
        match self {
            Self::All => RecordKind::ALL.to_vec(),
            Self::Only(kind) => vec![kind],
        }
    }
}

impl From<RecordKind> for Scope {
    fn from(value: RecordKind) -> Self {
        Self::Only(value)
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::All => f.write_str("all"),
            Self::Only(kind) => f.write_str(kind.collection_name()),
        }
    }
}

impl FromStr for Scope {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        if value.trim().eq_ignore_ascii_case("all") {
            return Ok(Self::All);
        }
        value.parse::<RecordKind>().map(Self::Only)
    }
}

/// Search options for one knowledge-base query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchQuery {
    /// Query text; matched as one literal, scored per term.
    pub text: String,
    pub scope: Scope,
    /// Keep only records referencing this ticker.
    pub ticker: Option<String>,
    /// Keep only records carrying at least one of these tags. Empty means no
    /// tag filter.
    pub tags: Vec<String>,
    /// Maximum number of hits; `None` returns all of them.
    pub limit: Option<usize>,
}

impl SearchQuery {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn scope(mut self, scope: impl Into<Scope>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn ticker(mut self, ticker: impl Into<String>) -> Self {
        self.ticker = Some(ticker.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

/// One ranked search result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SearchHit {
    /// Independent copy of the stored record.
    pub record: Record,
    /// Originating collection.
    pub collection: RecordKind,
    pub relevance_score: f64,
}

/// Returns whether `record` satisfies the query text and both filters.
pub fn matches(record: &Record, query: &SearchQuery) -> bool {
    text_matches(record, &query.text)
        && ticker_matches(record, query.ticker.as_deref())
        && tags_match(record, &query.tags)
}

/// Computes the relevance score of `record` for `text` at time `now`.
pub fn relevance_score(record: &Record, text: &str, now: DateTime<Utc>) -> f64 {
    let title = record.title.to_lowercase();
    let content = lowered(record.content.as_deref());
    let summary = lowered(record.summary.as_deref());

    let mut score = 0.0;
    for term in text.to_lowercase().split_whitespace() {
        if title.contains(term) {
            score += TITLE_WEIGHT;
        }
        if content.contains(term) {
            score += CONTENT_WEIGHT;
        }
        if summary.contains(term) {
            score += SUMMARY_WEIGHT;
        }
    }
    score + recency_bonus(record, now)
}

/// Bonus for recently created records; zero when `created_at` is unreadable.
pub fn recency_bonus(record: &Record, now: DateTime<Utc>) -> f64 {
    let Some(created_at) = record.created_at_utc() else {
        return 0.0;
    };
    let days_old = (now - created_at).num_days();
    if days_old < RECENT_WINDOW_DAYS {
        RECENT_BONUS
    } else if days_old < AGING_WINDOW_DAYS {
        AGING_BONUS
    } else {
        0.0
    }
}

/// Filters, scores and orders candidates.
///
/// `candidates` must already be in discovery order (collection order, then
/// storage order); the stable sort keeps that order among equal scores.
pub fn rank<I>(candidates: I, query: &SearchQuery, now: DateTime<Utc>) -> Vec<SearchHit>
where
    I: IntoIterator<Item = Record>,
{
    let mut hits = candidates
        .into_iter()
        .filter(|record| matches(record, query))
        .map(|record| SearchHit {
            relevance_score: relevance_score(&record, &query.text, now),
            collection: record.kind,
            record,
        })
        .collect::<Vec<_>>();

    hits.sort_by(|left, right| {
        right
            .relevance_score
            .partial_cmp(&left.relevance_score)
            .unwrap_or(Ordering::Equal)
    });
    if let Some(limit) = query.limit {
        hits.truncate(limit);
    }
    hits
}

/// The empty query is a substring of everything, so it matches every record.
fn text_matches(record: &Record, text: &str) -> bool {
    let needle = text.to_lowercase();
    record.title.to_lowercase().contains(&needle)
        || lowered(record.content.as_deref()).contains(&needle)
        || lowered(record.summary.as_deref()).contains(&needle)
}

fn ticker_matches(record: &Record, ticker: Option<&str>) -> bool {
    match ticker.map(str::trim).filter(|value| !value.is_empty()) {
        Some(ticker) => record.has_ticker(ticker),
        None => true,
    }
}

fn tags_match(record: &Record, tags: &[String]) -> bool {
    tags.is_empty() || tags.iter().any(|tag| record.has_tag(tag))
}

fn lowered(value: Option<&str>) -> String {
    value.unwrap_or_default().to_lowercase()
}
