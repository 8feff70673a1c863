use clap::Parser;
use serde::Serialize;
use sqlite3_trace::{TraceMaskArgs, TraceMaskConfig, TxPolicy};
use std::path::PathBuf;
use thiserror::Error;

/// Exit code when `--db` is missing or empty.
pub(crate) const EXIT_MISSING_DB: u8 = 3;

#[derive(Parser, Debug)]
#[command(author, version, about = "Exercise the SQLite trace hook: inserts and selects through direct, prepared, and transactional paths")]
pub(crate) struct Args {
    /// SQLite database filename
    #[arg(long)]
    pub(crate) db: Option<String>,
    /// Search pattern for SELECT
    #[arg(long = "search-pat", default_value = "")]
    pub(crate) search_pat: String,
    /// Number of rows to generate (for each approach tested)
    #[arg(long, default_value_t = 4)]
    pub(crate) nrows: u32,
    /// Rollback (abort) transactions instead of committing
    #[arg(long)]
    pub(crate) rollback: bool,
    /// Log at debug level
    #[arg(long)]
    pub(crate) verbose: bool,
    #[command(flatten)]
    pub(crate) trace: TraceMaskArgs,
}

#[derive(Debug, Error)]
pub(crate) enum StartupError {
    #[error("SQLite database filename not specified. Use --db=...")]
    MissingDb,
}

impl StartupError {
    pub(crate) fn exit_code(&self) -> u8 {
        match self {
            StartupError::MissingDb => EXIT_MISSING_DB,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct DemoConfig {
    pub(crate) db: PathBuf,
    pub(crate) search_pattern: String,
    pub(crate) nrows: u32,
    pub(crate) policy: TxPolicy,
    pub(crate) trace: TraceMaskConfig,
}

impl DemoConfig {
    pub(crate) fn from_args(args: Args) -> Result<Self, StartupError> {
        let db = match args.db {
            Some(db) if !db.is_empty() => PathBuf::from(db),
            _ => return Err(StartupError::MissingDb),
        };

        Ok(DemoConfig {
            db,
            search_pattern: args.search_pat,
            nrows: args.nrows,
            policy: TxPolicy {
                rollback_always: args.rollback,
            },
            trace: args.trace.to_config(),
        })
    }
}
