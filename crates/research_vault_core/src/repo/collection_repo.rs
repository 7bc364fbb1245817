//! Collection repository contracts and JSON-file implementation.
//!
//! # Responsibility
//! - Persist one kind's full record list to one backing file.
//! - Keep write paths crash-safe through temp-file + rename.
//!
//! # Invariants
//! - Readers never observe a partially written collection file.
//! - Missing or blank files load as an empty collection.
//! - Read paths reject records whose kind does not match the collection.

use crate::model::record::{Record, RecordKind};
use log::{debug, error, info};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Instant;
use uuid::Uuid;

const TEMP_FILE_SUFFIX: &str = "tmp";

pub type RepoResult<T> = Result<T, RepoError>;

/// Persistence error for collection load/save operations.
#[derive(Debug)]
pub enum RepoError {
    Io { path: PathBuf, source: io::Error },
    Serialization {
        path: PathBuf,
        source: serde_json::Error,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => write!(f, "i/o failure on `{}`: {source}", path.display()),
            Self::Serialization { path, source } => {
                write!(f, "malformed collection file `{}`: {source}", path.display())
            }
            Self::InvalidData(message) => write!(f, "invalid persisted record data: {message}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Serialization { source, .. } => Some(source),
            Self::InvalidData(_) => None,
        }
    }
}

/// Durable list-of-records storage for one collection.
pub trait CollectionRepository {
    /// Kind of every record held by this collection.
    fn kind(&self) -> RecordKind;
    /// Returns all persisted records in storage order.
    fn load(&self) -> RepoResult<Vec<Record>>;
    /// Atomically replaces the whole persisted collection.
    fn save(&self, records: &[Record]) -> RepoResult<()>;
}

/// JSON-array file backend; one pretty-printed file per collection.
#[derive(Debug, Clone)]
pub struct JsonFileCollection {
    kind: RecordKind,
    path: PathBuf,
}

impl JsonFileCollection {
    pub fn new(kind: RecordKind, path: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            path: path.into(),
        }
    }

    /// Builds the conventional `<dir>/<collection>.json` location.
    pub fn in_dir(kind: RecordKind, storage_dir: impl AsRef<Path>) -> Self {
        let file_name = format!("{}.json", kind.collection_name());
        Self::new(kind, storage_dir.as_ref().join(file_name))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Creates the parent directory and writes `[]` when the file is absent.
    ///
    /// # Errors
    /// - Returns `RepoError::Io` when the directory or file cannot be created.
    pub fn initialize(&self) -> RepoResult<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| self.io_error(parent, source))?;
        }
        if self.path.exists() {
            return Ok(());
        }
        self.save(&[])?;
        info!(
            "event=collection_init module=repo status=ok collection={} path={}",
            self.kind.collection_name(),
            self.path.display()
        );
        Ok(())
    }

    /// Fresh `<file>.<uuid>.tmp` next to the target, one per save, so
    /// concurrent writers never share a temp file.
    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(format!(".{}.{TEMP_FILE_SUFFIX}", Uuid::new_v4().simple()));
        PathBuf::from(name)
    }

    fn io_error(&self, path: &Path, source: io::Error) -> RepoError {
        RepoError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    fn write_temp(&self, temp_path: &Path, payload: &[u8]) -> io::Result<()> {
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(temp_path)?;
        file.write_all(payload)?;
        file.write_all(b"\n")?;
        file.sync_all()
    }
}

impl CollectionRepository for JsonFileCollection {
    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn load(&self) -> RepoResult<Vec<Record>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(self.io_error(&self.path, err)),
        };
        if raw.trim().is_empty() {
            return Ok(Vec::new());
        }

        let records: Vec<Record> =
            serde_json::from_str(&raw).map_err(|source| RepoError::Serialization {
                path: self.path.clone(),
                source,
            })?;
        ensure_kind(self.kind, &records)?;
        debug!(
            "event=collection_load module=repo status=ok collection={} count={}",
            self.kind.collection_name(),
            records.len()
        );
        Ok(records)
    }

    fn save(&self, records: &[Record]) -> RepoResult<()> {
        let started_at = Instant::now();
        let payload =
            serde_json::to_vec_pretty(records).map_err(|source| RepoError::Serialization {
                path: self.path.clone(),
                source,
            })?;

        let temp_path = self.temp_path();
        if let Err(err) = self.write_temp(&temp_path, &payload) {
            let _ = fs::remove_file(&temp_path);
            error!(
                "event=collection_save module=repo status=error collection={} stage=write error={}",
                self.kind.collection_name(),
                err
            );
            return Err(self.io_error(&temp_path, err));
        }
        if let Err(err) = fs::rename(&temp_path, &self.path) {
            let _ = fs::remove_file(&temp_path);
            error!(
                "event=collection_save module=repo status=error collection={} stage=rename error={}",
                self.kind.collection_name(),
                err
            );
            return Err(self.io_error(&self.path, err));
        }

        debug!(
            "event=collection_save module=repo status=ok collection={} count={} duration_ms={}",
            self.kind.collection_name(),
            records.len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }
}

/// In-process backend; state lives only as long as the value.
#[derive(Debug)]
pub struct MemoryCollection {
    kind: RecordKind,
    records: Mutex<Vec<Record>>,
}

impl MemoryCollection {
    pub fn new(kind: RecordKind) -> Self {
        Self::with_records(kind, Vec::new())
    }

    /// Seeds the collection, e.g. with fixtures carrying fixed timestamps.
    pub fn with_records(kind: RecordKind, records: Vec<Record>) -> Self {
        Self {
            kind,
            records: Mutex::new(records),
        }
    }
}

impl CollectionRepository for MemoryCollection {
    fn kind(&self) -> RecordKind {
        self.kind
    }

    fn load(&self) -> RepoResult<Vec<Record>> {
        let records = self
            .records
            .lock()
            .map_err(|_| RepoError::InvalidData("memory collection lock poisoned".to_string()))?;
        Ok(records.clone())
    }

    fn save(&self, records: &[Record]) -> RepoResult<()> {
        ensure_kind(self.kind, records)?;
        let mut stored = self
            .records
            .lock()
            .map_err(|_| RepoError::InvalidData("memory collection lock poisoned".to_string()))?;
        *stored = records.to_vec();
        Ok(())
    }
}

fn ensure_kind(expected: RecordKind, records: &[Record]) -> RepoResult<()> {
    match records.iter().find(|record| record.kind != expected) {
        Some(stray) => Err(RepoError::InvalidData(format!(
            "record {} of kind `{}` found in `{}` collection",
            stray.id,
            stray.kind,
            expected.collection_name()
        ))),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{CollectionRepository, JsonFileCollection};
    use crate::model::record::RecordKind;
    use std::path::{Path, PathBuf};

    #[test]
    fn in_dir_uses_collection_file_names() {
        let dir = PathBuf::from("/data/kb");
        assert_eq!(
            JsonFileCollection::in_dir(RecordKind::Note, &dir).path(),
            dir.join("notes.json")
        );
        assert_eq!(
            JsonFileCollection::in_dir(RecordKind::Article, &dir).path(),
            dir.join("articles.json")
        );
        assert_eq!(
            JsonFileCollection::in_dir(RecordKind::Research, &dir).path(),
            dir.join("research.json")
        );
    }

    #[test]
    fn temp_paths_sit_next_to_target_and_are_unique_per_save() {
        let repo = JsonFileCollection::new(RecordKind::Note, "/data/kb/notes.json");
        let first = repo.temp_path();
        let second = repo.temp_path();

        assert_ne!(first, second);
        for temp in [&first, &second] {
            assert_eq!(temp.parent(), Some(Path::new("/data/kb")));
            let name = temp.file_name().unwrap().to_string_lossy().to_string();
            assert!(name.starts_with("notes.json."));
            assert!(name.ends_with(".tmp"));
        }
        assert_eq!(repo.kind(), RecordKind::Note);
    }
}
