//! Command-line entry point for the research knowledge base.
//!
//! # Responsibility
//! - Map subcommands onto `KnowledgeBase` operations.
//! - Print results as pretty JSON and exit non-zero on failure.

use clap::{Args, Parser, Subcommand};
use log::error;
use research_vault_core::{
    core_version, default_log_level, init_logging, init_logging_from_env, KnowledgeBase,
    KnowledgeBaseConfig, NewRecord, ReadFailurePolicy, RecordId, RecordKind, RecordPatch, Scope,
    SearchQuery,
};
use serde_json::json;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "research-vault", version, about = "Personal research knowledge base")]
struct Cli {
    /// Storage directory; overrides RESEARCH_VAULT_DIR.
    #[arg(long, global = true)]
    dir: Option<PathBuf>,

    /// How reads treat unreadable collections (degrade|propagate).
    #[arg(long, global = true)]
    read_policy: Option<ReadFailurePolicy>,

    /// Absolute directory for rolling log files.
    #[arg(long, global = true)]
    log_dir: Option<String>,

    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Args)]
struct Labels {
    /// Tag; repeat for several.
    #[arg(long = "tag")]
    tags: Vec<String>,

    /// Related ticker; repeat for several.
    #[arg(long = "ticker")]
    tickers: Vec<String>,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Add a personal note.
    AddNote {
        title: String,
        content: String,
        #[command(flatten)]
        labels: Labels,
    },
    /// Bookmark an article.
    AddArticle {
        title: String,
        url: String,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[command(flatten)]
        labels: Labels,
    },
    /// Add a research write-up.
    AddResearch {
        title: String,
        content: String,
        #[arg(long)]
        source: Option<String>,
        #[command(flatten)]
        labels: Labels,
    },
    /// Show one record.
    Get {
        id: RecordId,
        #[arg(long)]
        kind: Option<RecordKind>,
    },
    /// List records.
    List {
        #[arg(long, default_value = "all")]
        scope: Scope,
    },
    /// Ranked free-text search.
    Search {
        query: String,
        #[arg(long, default_value = "all")]
        scope: Scope,
        #[arg(long)]
        ticker: Option<String>,
        #[arg(long = "tag")]
        tags: Vec<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Change selected fields of one record.
    Update {
        id: RecordId,
        kind: RecordKind,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        summary: Option<String>,
        #[arg(long)]
        source: Option<String>,
        /// Replace the tag set; repeat for several.
        #[arg(long = "tag")]
        tags: Option<Vec<String>>,
        /// Replace the ticker set; repeat for several.
        #[arg(long = "ticker")]
        tickers: Option<Vec<String>>,
    },
    /// Delete one record.
    Delete { id: RecordId, kind: RecordKind },
    /// List every known tag.
    Tags,
    /// Print the core version.
    Version,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    if let Err(err) = start_logging(&cli) {
        eprintln!("logging disabled: {err}");
    }

    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("event=cli_exit module=cli status=error error={err}");
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn start_logging(cli: &Cli) -> Result<(), String> {
    match cli.log_dir.as_deref() {
        Some(log_dir) => {
            let level = cli.log_level.as_deref().unwrap_or(default_log_level());
            init_logging(level, log_dir)
        }
        None => init_logging_from_env().map(|_| ()),
    }
}

fn resolve_config(cli: &Cli) -> KnowledgeBaseConfig {
    let mut config = KnowledgeBaseConfig::from_env();
    if let Some(dir) = cli.dir.clone() {
        config.storage_dir = dir;
    }
    if let Some(policy) = cli.read_policy {
        config.read_failure_policy = policy;
    }
    config
}

fn run(cli: Cli) -> Result<String, Box<dyn std::error::Error>> {
    if matches!(cli.command, Command::Version) {
        return Ok(core_version().to_string());
    }

    let kb = KnowledgeBase::open(&resolve_config(&cli))?;
    let value = match cli.command {
        Command::AddNote {
            title,
            content,
            labels,
        } => {
            let draft = NewRecord::note(title, content)
                .with_tags(labels.tags)
                .with_tickers(labels.tickers);
            json!({ "id": kb.add(draft)? })
        }
        Command::AddArticle {
            title,
            url,
            summary,
            content,
            labels,
        } => {
            let mut draft = NewRecord::article(title, url)
                .with_tags(labels.tags)
                .with_tickers(labels.tickers);
            draft.summary = summary;
            draft.content = content;
            json!({ "id": kb.add(draft)? })
        }
        Command::AddResearch {
            title,
            content,
            source,
            labels,
        } => {
            let mut draft = NewRecord::research(title, content)
                .with_tags(labels.tags)
                .with_tickers(labels.tickers);
            draft.source = source;
            json!({ "id": kb.add(draft)? })
        }
        Command::Get { id, kind } => serde_json::to_value(kb.get(id, kind)?)?,
        Command::List { scope } => serde_json::to_value(kb.list_all(scope)?)?,
        Command::Search {
            query,
            scope,
            ticker,
            tags,
            limit,
        } => {
            let query = SearchQuery {
                text: query,
                scope,
                ticker,
                tags,
                limit,
            };
            serde_json::to_value(kb.search(&query)?)?
        }
        Command::Update {
            id,
            kind,
            title,
            content,
            url,
            summary,
            source,
            tags,
            tickers,
        } => {
            let patch = RecordPatch {
                title,
                content,
                url,
                summary,
                source,
                tags,
                related_tickers: tickers,
            };
            json!({ "updated": kb.update(id, kind, patch)? })
        }
        Command::Delete { id, kind } => json!({ "deleted": kb.delete(id, kind)? }),
        Command::Tags => serde_json::to_value(kb.list_tags()?)?,
        Command::Version => unreachable!("handled before opening storage"),
    };

    Ok(serde_json::to_string_pretty(&value)?)
}
