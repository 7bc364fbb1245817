//! Knowledge-base configuration.
//!
//! # Responsibility
//! - Name the environment variables read by core and the CLI.
//! - Resolve a `KnowledgeBaseConfig` from env vars with stable defaults.
//!
//! # Invariants
//! - Resolution never fails; unknown values fall back to defaults.

use log::warn;
use std::env;
use std::fmt::{Display, Formatter};
use std::path::PathBuf;
use std::str::FromStr;

/// Environment variable names.
pub mod env_vars {
    /// Directory holding `notes.json`, `articles.json` and `research.json`.
    pub const STORAGE_DIR: &str = "RESEARCH_VAULT_DIR";
    /// `degrade` or `propagate`.
    pub const READ_POLICY: &str = "RESEARCH_VAULT_READ_POLICY";
    pub const LOG_LEVEL: &str = "RESEARCH_VAULT_LOG_LEVEL";
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub const LOG_DIR: &str = "RESEARCH_VAULT_LOG_DIR";
}

/// Default values.
pub mod defaults {
    pub const STORAGE_DIR: &str = "./data/knowledge_base";
}

/// How read-only operations react to an unreadable collection.
///
/// Mutations always propagate load failures regardless of this setting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ReadFailurePolicy {
    /// Log the failure and treat the collection as empty.
    #[default]
    Degrade,
    /// Return the storage error to the caller.
    Propagate,
}

impl Display for ReadFailurePolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Degrade => f.write_str("degrade"),
            Self::Propagate => f.write_str("propagate"),
        }
    }
}

impl FromStr for ReadFailurePolicy {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "degrade" | "lenient" => Ok(Self::Degrade),
            "propagate" | "strict" => Ok(Self::Propagate),
            other => Err(format!(
                "unsupported read policy `{other}`; expected degrade|propagate"
            )),
        }
    }
}

/// Storage location and failure policy for one knowledge base.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KnowledgeBaseConfig {
    pub storage_dir: PathBuf,
    pub read_failure_policy: ReadFailurePolicy,
}

impl Default for KnowledgeBaseConfig {
    fn default() -> Self {
        Self {
            storage_dir: PathBuf::from(defaults::STORAGE_DIR),
            read_failure_policy: ReadFailurePolicy::default(),
        }
    }
}

impl KnowledgeBaseConfig {
    pub fn new(storage_dir: impl Into<PathBuf>) -> Self {
        Self {
            storage_dir: storage_dir.into(),
            ..Self::default()
        }
    }

    pub fn with_read_failure_policy(mut self, policy: ReadFailurePolicy) -> Self {
        self.read_failure_policy = policy;
        self
    }

    /// Reads configuration from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Resolves configuration through an arbitrary variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup(env_vars::STORAGE_DIR).filter(|value| !value.trim().is_empty())
        {
            config.storage_dir = PathBuf::from(dir.trim());
        }

        if let Some(raw) = lookup(env_vars::READ_POLICY) {
            match raw.parse::<ReadFailurePolicy>() {
                Ok(policy) => config.read_failure_policy = policy,
                Err(err) => warn!(
                    "event=config_resolve module=config status=fallback key={} error={}",
                    env_vars::READ_POLICY,
                    err
                ),
            }
        }

        config
    }
}
