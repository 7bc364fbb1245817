//! Record domain model.
//!
//! # Responsibility
//! - Define the canonical record persisted by each collection.
//! - Normalize tags/tickers and validate kind-required fields.
//! - Apply typed partial updates without touching identity fields.
//!
//! # Invariants
//! - `id`, `kind` and `created_at` never change after creation.
//! - `created_at <= updated_at` for every record produced by this module.
//! - Fields that do not apply to a kind are stored as `None`.

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

/// Stable identifier for every stored record.
///
/// Generated from one global UUID v4 source, so ids are unique across kinds.
pub type RecordId = Uuid;

/// Collection a record belongs to for its whole lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    /// Personal free-form note.
    Note,
    /// Bookmarked article identified by its URL.
    Article,
    /// Research write-up with an optional source.
    Research,
}

impl RecordKind {
    /// Fixed collection order used by lookups, listings and search.
    pub const ALL: [RecordKind; 3] = [RecordKind::Note, RecordKind::Article, RecordKind::Research];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Note => "note",
            Self::Article => "article",
            Self::Research => "research",
        }
    }

    /// Name of the collection holding records of this kind.
    pub fn collection_name(self) -> &'static str {
        match self {
            Self::Note => "notes",
            Self::Article => "articles",
            Self::Research => "research",
        }
    }

    /// Whether `url` is meaningful for this kind.
    pub fn uses_url(self) -> bool {
        matches!(self, Self::Article)
    }

    /// Whether `summary` is meaningful for this kind.
    pub fn uses_summary(self) -> bool {
        matches!(self, Self::Article)
    }

    /// Whether `source` is meaningful for this kind.
    pub fn uses_source(self) -> bool {
        matches!(self, Self::Research)
    }

    /// Whether `content` must be present and non-empty.
    pub fn requires_content(self) -> bool {
        matches!(self, Self::Note | Self::Research)
    }
}

impl Display for RecordKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordKind {
    type Err = String;

    /// Accepts both kind names (`note`) and collection names (`notes`).
    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "note" | "notes" => Ok(Self::Note),
            "article" | "articles" => Ok(Self::Article),
            "research" | "researches" => Ok(Self::Research),
            other => Err(format!(
                "unknown record kind `{other}`; expected note|article|research"
            )),
        }
    }
}

/// Validation failures for record creation and updates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordValidationError {
    EmptyTitle,
    MissingContent(RecordKind),
    MissingUrl,
}

impl Display for RecordValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyTitle => write!(f, "title must not be empty"),
            Self::MissingContent(kind) => write!(f, "{kind} requires non-empty content"),
            Self::MissingUrl => write!(f, "article requires a non-empty url"),
        }
    }
}

impl Error for RecordValidationError {}

/// Canonical stored record for notes, articles and research entries.
///
/// Timestamps are kept as persisted ISO-8601 text; a malformed stamp from an
/// older file survives round-trips and parses to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Record {
    pub id: RecordId,
    /// Older files name this field `type`.
    #[serde(alias = "type")]
    pub kind: RecordKind,
    pub title: String,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub source: Option<String>,
    /// Case preserved for display, matched case-insensitively.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Uppercase ticker symbols.
    #[serde(default)]
    pub related_tickers: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl Record {
    /// Checks the title and kind-required fields.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        validate_fields(
            self.kind,
            &self.title,
            self.content.as_deref(),
            self.url.as_deref(),
        )
    }

    /// Parsed creation time, `None` when the stored stamp is malformed.
    pub fn created_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.created_at)
    }

    pub fn updated_at_utc(&self) -> Option<DateTime<Utc>> {
        parse_timestamp(&self.updated_at)
    }

    /// Case-insensitive tag membership.
    pub fn has_tag(&self, tag: &str) -> bool {
        let needle = tag.trim().to_lowercase();
        self.tags.iter().any(|value| value.to_lowercase() == needle)
    }

    /// Case-insensitive ticker membership.
    pub fn has_ticker(&self, ticker: &str) -> bool {
        let needle = ticker.trim().to_uppercase();
        self.related_tickers
            .iter()
            .any(|value| value.to_uppercase() == needle)
    }

    /// Applies a typed partial update in place.
    ///
    /// Slots that do not apply to this record's kind are ignored. The patch is
    /// validated as a whole before anything is written back, so a rejected
    /// patch leaves the record unchanged.
    ///
    /// # Errors
    /// - Returns `RecordValidationError` when the patched record is invalid.
    pub fn apply_patch(
        &mut self,
        patch: RecordPatch,
        now: DateTime<Utc>,
    ) -> Result<(), RecordValidationError> {
        let mut candidate = self.clone();

        if let Some(title) = patch.title {
            candidate.title = title;
        }
        if let Some(content) = patch.content {
            candidate.content = Some(content);
        }
        if let Some(url) = patch.url.filter(|_| self.kind.uses_url()) {
            candidate.url = Some(url);
        }
        if let Some(summary) = patch.summary.filter(|_| self.kind.uses_summary()) {
            candidate.summary = Some(summary);
        }
        if let Some(source) = patch.source.filter(|_| self.kind.uses_source()) {
            candidate.source = Some(source);
        }
        if let Some(tags) = patch.tags {
            candidate.tags = normalize_tags(&tags);
        }
        if let Some(tickers) = patch.related_tickers {
            candidate.related_tickers = normalize_tickers(&tickers);
        }

        candidate.validate()?;
        candidate.touch(now);
        *self = candidate;
        Ok(())
    }

    /// Refreshes `updated_at`, never moving it before `created_at`.
    fn touch(&mut self, now: DateTime<Utc>) {
        let effective = match self.created_at_utc() {
            Some(created) if created > now => created,
            _ => now,
        };
        self.updated_at = format_timestamp(effective);
    }
}

/// Creation draft for a new record.
///
/// Identity and timestamps are assigned by the knowledge base, not callers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub kind: RecordKind,
    pub title: String,
    pub content: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub tags: Vec<String>,
    pub related_tickers: Vec<String>,
}

impl NewRecord {
    fn empty(kind: RecordKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            content: None,
            url: None,
            summary: None,
            source: None,
            tags: Vec::new(),
            related_tickers: Vec::new(),
        }
    }

    /// Draft for a personal note.
    pub fn note(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::empty(RecordKind::Note, title).with_content(content)
    }

    /// Draft for a bookmarked article.
    pub fn article(title: impl Into<String>, url: impl Into<String>) -> Self {
        let mut draft = Self::empty(RecordKind::Article, title);
        draft.url = Some(url.into());
        draft
    }

    /// Draft for a research write-up.
    pub fn research(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self::empty(RecordKind::Research, title).with_content(content)
    }

    pub fn with_content(mut self, content: impl Into<String>) -> Self {
        self.content = Some(content.into());
        self
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_tickers = tickers.into_iter().map(Into::into).collect();
        self
    }

    /// Validates required-by-kind fields before any id is assigned.
    pub fn validate(&self) -> Result<(), RecordValidationError> {
        validate_fields(
            self.kind,
            &self.title,
            self.content.as_deref(),
            self.url.as_deref(),
        )
    }

    /// Turns the draft into a stored record with system-assigned fields.
    ///
    /// # Invariants
    /// - `created_at == updated_at` on the returned record.
    /// - Fields not used by the kind are dropped to `None`.
    pub fn into_record(
        self,
        id: RecordId,
        now: DateTime<Utc>,
    ) -> Result<Record, RecordValidationError> {
        self.validate()?;
        let kind = self.kind;
        let stamp = format_timestamp(now);
        Ok(Record {
            id,
            kind,
            title: self.title,
            content: self.content,
            url: self.url.filter(|_| kind.uses_url()),
            summary: self.summary.filter(|_| kind.uses_summary()),
            source: self.source.filter(|_| kind.uses_source()),
            tags: normalize_tags(&self.tags),
            related_tickers: normalize_tickers(&self.related_tickers),
            created_at: stamp.clone(),
            updated_at: stamp,
        })
    }
}

/// Typed partial update; `None` slots leave the stored value unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordPatch {
    pub title: Option<String>,
    pub content: Option<String>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub source: Option<String>,
    pub tags: Option<Vec<String>>,
    pub related_tickers: Option<Vec<String>>,
}

impl RecordPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, value: impl Into<String>) -> Self {
        self.title = Some(value.into());
        self
    }

    pub fn content(mut self, value: impl Into<String>) -> Self {
        self.content = Some(value.into());
        self
    }

    pub fn url(mut self, value: impl Into<String>) -> Self {
        self.url = Some(value.into());
        self
    }

    pub fn summary(mut self, value: impl Into<String>) -> Self {
        self.summary = Some(value.into());
        self
    }

    pub fn source(mut self, value: impl Into<String>) -> Self {
        self.source = Some(value.into());
        self
    }

    pub fn tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = Some(tags.into_iter().map(Into::into).collect());
        self
    }

    pub fn related_tickers<I, S>(mut self, tickers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.related_tickers = Some(tickers.into_iter().map(Into::into).collect());
        self
    }
}

/// Formats a timestamp the way new records are persisted (RFC 3339, UTC).
pub fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Parses a persisted timestamp.
///
/// Accepts RFC 3339 and naive `YYYY-MM-DDTHH:MM:SS[.f]` stamps, the latter
/// interpreted as UTC. Returns `None` for anything else.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Normalizes one tag: trimmed, `None` when empty. Case is preserved.
pub fn normalize_tag(tag: &str) -> Option<String> {
    let trimmed = tag.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

/// Normalizes tags and drops case-insensitive duplicates, keeping the first
/// spelling and input order.
pub fn normalize_tags(tags: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tags.iter()
        .filter_map(|tag| normalize_tag(tag))
        .filter(|tag| seen.insert(tag.to_lowercase()))
        .collect()
}

/// Uppercases tickers and drops empty values and duplicates.
pub fn normalize_tickers(tickers: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    tickers
        .iter()
        .map(|ticker| ticker.trim().to_uppercase())
        .filter(|ticker| !ticker.is_empty())
        .filter(|ticker| seen.insert(ticker.clone()))
        .collect()
}

fn validate_fields(
    kind: RecordKind,
    title: &str,
    content: Option<&str>,
    url: Option<&str>,
) -> Result<(), RecordValidationError> {
    if title.is_empty() {
        return Err(RecordValidationError::EmptyTitle);
    }
    if kind.requires_content() && content.map_or(true, str::is_empty) {
        return Err(RecordValidationError::MissingContent(kind));
    }
    if kind.uses_url() && url.map_or(true, str::is_empty) {
        return Err(RecordValidationError::MissingUrl);
    }
    Ok(())
}
