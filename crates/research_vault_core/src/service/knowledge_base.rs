//! Knowledge base use-case service.
//!
//! # Responsibility
//! - Own the note/article/research collections and be their only writer.
//! - Assign identity and timestamps, apply typed partial updates.
//! - Run ranked free-text search across one or all collections.
//!
//! # Invariants
//! - Every load-modify-save cycle on a collection holds that collection's
//!   lock, so in-process writers of one kind are serialized.
//! - Mutations never persist after a failed load; a corrupt file is not
//!   overwritten with a partial snapshot.
//! - Callers only ever receive copies of stored records.
//!
//! Cross-process writers sharing one storage directory are not coordinated;
//! the last full-collection save wins.

use crate::config::{KnowledgeBaseConfig, ReadFailurePolicy};
use crate::model::record::{
    NewRecord, Record, RecordId, RecordKind, RecordPatch, RecordValidationError,
};
use crate::repo::collection_repo::{CollectionRepository, JsonFileCollection, RepoError};
use crate::search::ranking::{rank, Scope, SearchHit, SearchQuery};
use chrono::{DateTime, Utc};
use log::{debug, error, info, warn};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::Path;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Instant;
use uuid::Uuid;

pub type KbResult<T> = Result<T, KbError>;

/// Service error for knowledge-base use-cases.
///
/// Missing ids are not errors; they surface as `false` / `None` results.
#[derive(Debug)]
pub enum KbError {
    /// A create or update input broke a record rule.
    Validation(RecordValidationError),
    /// The backing medium could not be read or written.
    Storage(RepoError),
}

impl Display for KbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "validation failed: {err}"),
            Self::Storage(err) => write!(f, "storage failed: {err}"),
        }
    }
}

impl Error for KbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Storage(err) => Some(err),
        }
    }
}

impl From<RecordValidationError> for KbError {
    fn from(value: RecordValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<RepoError> for KbError {
    fn from(value: RepoError) -> Self {
        Self::Storage(value)
    }
}

/// Time source used for record timestamps and recency scoring.
pub type Clock = fn() -> DateTime<Utc>;

struct Collection<R> {
    repo: R,
    write_lock: Mutex<()>,
}

impl<R: CollectionRepository> Collection<R> {
    fn new(repo: R) -> Self {
        Self {
            repo,
            write_lock: Mutex::new(()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        // The guarded value is `()`, so a poisoned lock carries no broken state.
        self.write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

/// Personal research store over three independently persisted collections.
pub struct KnowledgeBase<R: CollectionRepository> {
    notes: Collection<R>,
    articles: Collection<R>,
    research: Collection<R>,
    read_failure_policy: ReadFailurePolicy,
    clock: Clock,
}

impl KnowledgeBase<JsonFileCollection> {
    /// Opens (and initializes when absent) the JSON-file collections under
    /// `config.storage_dir`.
    ///
    /// # Errors
    /// - Returns `KbError::Storage` when the directory or files cannot be
    ///   created.
    pub fn open(config: &KnowledgeBaseConfig) -> KbResult<Self> {
        let dir = config.storage_dir.as_path();
        let repos = RecordKind::ALL.map(|kind| JsonFileCollection::in_dir(kind, dir));
        for repo in &repos {
            if let Err(err) = repo.initialize() {
                error!(
                    "event=kb_open module=service status=error path={} error={}",
                    dir.display(),
                    err
                );
                return Err(err.into());
            }
        }

        let [notes, articles, research] = repos;
        let kb = Self::with_repositories(notes, articles, research, config.read_failure_policy)?;
        info!(
            "event=kb_open module=service status=ok path={} read_policy={}",
            dir.display(),
            config.read_failure_policy
        );
        Ok(kb)
    }

    /// Opens a knowledge base in `storage_dir` with default settings.
    pub fn open_dir(storage_dir: impl AsRef<Path>) -> KbResult<Self> {
        Self::open(&KnowledgeBaseConfig::new(storage_dir.as_ref()))
    }
}

impl<R: CollectionRepository> KnowledgeBase<R> {
    /// Builds a knowledge base over caller-provided repositories.
    ///
    /// # Errors
    /// - Returns `KbError::Storage` when a repository serves the wrong kind.
    pub fn with_repositories(
        notes: R,
        articles: R,
        research: R,
        read_failure_policy: ReadFailurePolicy,
    ) -> KbResult<Self> {
        for (repo, expected) in [
            (&notes, RecordKind::Note),
            (&articles, RecordKind::Article),
            (&research, RecordKind::Research),
        ] {
            if repo.kind() != expected {
                return Err(KbError::Storage(RepoError::InvalidData(format!(
                    "repository for `{}` wired as `{}` collection",
                    repo.kind().collection_name(),
                    expected.collection_name()
                ))));
            }
        }

        Ok(Self {
            notes: Collection::new(notes),
            articles: Collection::new(articles),
            research: Collection::new(research),
            read_failure_policy,
            clock: Utc::now,
        })
    }

    /// Replaces the time source; used to pin recency scoring in tests.
    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn read_failure_policy(&self) -> ReadFailurePolicy {
        self.read_failure_policy
    }

    /// Creates one record and returns its fresh id.
    ///
    /// # Errors
    /// - `KbError::Validation` when required-by-kind fields are missing.
    /// - `KbError::Storage` when the collection cannot be read or written.
    pub fn add(&self, draft: NewRecord) -> KbResult<RecordId> {
        let kind = draft.kind;
        if let Err(err) = draft.validate() {
            warn!(
                "event=kb_add module=service status=rejected kind={} error={}",
                kind, err
            );
            return Err(err.into());
        }

        let collection = self.collection(kind);
        let _guard = collection.lock();
        let mut records = self.load_for_write(kind)?;

        let mut id = Uuid::new_v4();
        while records.iter().any(|record| record.id == id) {
            id = Uuid::new_v4();
        }
        records.push(draft.into_record(id, (self.clock)())?);
        self.save(kind, &records)?;

        info!(
            "event=kb_add module=service status=ok kind={} id={} count={}",
            kind,
            id,
            records.len()
        );
        Ok(id)
    }

    /// Adds a personal note.
    pub fn add_note(
        &self,
        title: &str,
        content: &str,
        tags: &[&str],
        related_tickers: &[&str],
    ) -> KbResult<RecordId> {
        self.add(
            NewRecord::note(title, content)
                .with_tags(tags.iter().copied())
                .with_tickers(related_tickers.iter().copied()),
        )
    }

    /// Adds a bookmarked article.
    pub fn add_article(
        &self,
        title: &str,
        url: &str,
        summary: Option<&str>,
        content: Option<&str>,
        tags: &[&str],
        related_tickers: &[&str],
    ) -> KbResult<RecordId> {
        let mut draft = NewRecord::article(title, url)
            .with_tags(tags.iter().copied())
            .with_tickers(related_tickers.iter().copied());
        draft.summary = summary.map(str::to_string);
        draft.content = content.map(str::to_string);
        self.add(draft)
    }

    /// Adds a research write-up.
    pub fn add_research(
        &self,
        title: &str,
        content: &str,
        source: Option<&str>,
        tags: &[&str],
        related_tickers: &[&str],
    ) -> KbResult<RecordId> {
        let mut draft = NewRecord::research(title, content)
            .with_tags(tags.iter().copied())
            .with_tickers(related_tickers.iter().copied());
        draft.source = source.map(str::to_string);
        self.add(draft)
    }

    /// Applies `patch` to the record `id` in the `kind` collection.
    ///
    /// Returns `Ok(false)` when no such record exists. Slots that do not
    /// apply to the record's kind are ignored; `updated_at` is refreshed on
    /// every successful call.
    ///
    /// # Errors
    /// - `KbError::Validation` when the patched record would be invalid.
    /// - `KbError::Storage` when the collection cannot be read or written.
    pub fn update(&self, id: RecordId, kind: RecordKind, patch: RecordPatch) -> KbResult<bool> {
        let collection = self.collection(kind);
        let _guard = collection.lock();
        let mut records = self.load_for_write(kind)?;

        let Some(record) = records.iter_mut().find(|record| record.id == id) else {
            debug!(
                "event=kb_update module=service status=not_found kind={} id={}",
                kind, id
            );
            return Ok(false);
        };
        if let Err(err) = record.apply_patch(patch, (self.clock)()) {
            warn!(
                "event=kb_update module=service status=rejected kind={} id={} error={}",
                kind, id, err
            );
            return Err(err.into());
        }
        self.save(kind, &records)?;

        info!(
            "event=kb_update module=service status=ok kind={} id={}",
            kind, id
        );
        Ok(true)
    }

    /// Removes the record `id` from the `kind` collection.
    ///
    /// Returns whether a record was removed; nothing is written otherwise.
    pub fn delete(&self, id: RecordId, kind: RecordKind) -> KbResult<bool> {
        let collection = self.collection(kind);
        let _guard = collection.lock();
        let mut records = self.load_for_write(kind)?;

        let before = records.len();
        records.retain(|record| record.id != id);
        if records.len() == before {
            debug!(
                "event=kb_delete module=service status=not_found kind={} id={}",
                kind, id
            );
            return Ok(false);
        }
        self.save(kind, &records)?;

        info!(
            "event=kb_delete module=service status=ok kind={} id={} count={}",
            kind,
            id,
            records.len()
        );
        Ok(true)
    }

    /// Finds one record by id.
    ///
    /// With `kind = None` the collections are searched in fixed order
    /// (notes, articles, research) and the first match wins.
    pub fn get(&self, id: RecordId, kind: Option<RecordKind>) -> KbResult<Option<Record>> {
        let scope = kind.map_or(Scope::All, Scope::Only);
        for kind in scope.kinds() {
            if let Some(record) = self
                .load_for_read(kind)?
                .into_iter()
                .find(|record| record.id == id)
            {
                return Ok(Some(record));
            }
        }
        Ok(None)
    }

    /// Lists every record in `scope`, collection order then storage order.
    pub fn list_all(&self, scope: Scope) -> KbResult<Vec<Record>> {
        let mut records = Vec::new();
        for kind in scope.kinds() {
            records.extend(self.load_for_read(kind)?);
        }
        Ok(records)
    }

    /// Runs a ranked search.
    ///
    /// Hits are sorted by descending relevance; equal scores keep discovery
    /// order. Records matched only through filters keep a zero text score.
    pub fn search(&self, query: &SearchQuery) -> KbResult<Vec<SearchHit>> {
        let started_at = Instant::now();
        let candidates = self.list_all(query.scope)?;
        let scanned = candidates.len();
        let hits = rank(candidates, query, (self.clock)());

        debug!(
            "event=kb_search module=service status=ok scope={} scanned={} hits={} duration_ms={}",
            query.scope,
            scanned,
            hits.len(),
            started_at.elapsed().as_millis()
        );
        Ok(hits)
    }

    /// Returns every distinct tag, deduplicated and sorted case-insensitively.
    ///
    /// The first spelling met in collection order is the one reported.
    pub fn list_tags(&self) -> KbResult<Vec<String>> {
        let mut seen = HashSet::new();
        let mut tags = self
            .list_all(Scope::All)?
            .into_iter()
            .flat_map(|record| record.tags)
            .filter(|tag| seen.insert(tag.to_lowercase()))
            .collect::<Vec<_>>();
        tags.sort_by_key(|tag| tag.to_lowercase());
        Ok(tags)
    }

    fn collection(&self, kind: RecordKind) -> &Collection<R> {
        match kind {
            RecordKind::Note => &self.notes,
            RecordKind::Article => &self.articles,
            RecordKind::Research => &self.research,
        }
    }

    fn load_for_write(&self, kind: RecordKind) -> KbResult<Vec<Record>> {
        self.collection(kind).repo.load().map_err(|err| {
            error!(
                "event=collection_load module=service status=error mode=write collection={} error={}",
                kind.collection_name(),
                err
            );
            KbError::Storage(err)
        })
    }

    fn load_for_read(&self, kind: RecordKind) -> KbResult<Vec<Record>> {
        match self.collection(kind).repo.load() {
            Ok(records) => Ok(records),
            Err(err) => {
                error!(
                    "event=collection_load module=service status=error mode=read collection={} policy={} error={}",
                    kind.collection_name(),
                    self.read_failure_policy,
                    err
                );
                match self.read_failure_policy {
                    ReadFailurePolicy::Degrade => Ok(Vec::new()),
                    ReadFailurePolicy::Propagate => Err(KbError::Storage(err)),
                }
            }
        }
    }

    fn save(&self, kind: RecordKind, records: &[Record]) -> KbResult<()> {
        self.collection(kind).repo.save(records).map_err(|err| {
            error!(
                "event=collection_save module=service status=error collection={} error={}",
                kind.collection_name(),
                err
            );
            KbError::Storage(err)
        })
    }
}
