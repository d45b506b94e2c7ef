//! Command-line definitions (clap derive).

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Flashback - timestamped snapshot notes on SQLite
#[derive(Parser, Debug)]
#[command(name = "flashback")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Config directory (default: ~/.flashback)
    #[arg(long, global = true, env = "FLASHBACK_CONFIG_DIR")]
    pub config_dir: Option<PathBuf>,

    /// Database file, overriding the config
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Check the database, apply migrations and mark setup as done
    Setup(SetupArgs),

    /// Apply every pending migration
    Migrate,

    /// Revert the most recently applied migrations
    Rollback(RollbackArgs),

    /// Show applied, pending and orphaned migrations
    Status,

    /// Record a new snapshot
    Capture(CaptureArgs),

    /// Search snapshots
    Search(SearchArgs),

    /// Soft-delete a snapshot
    Delete(DeleteArgs),
}

#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Run again even if setup already completed
    #[arg(long)]
    pub force: bool,
}

#[derive(Args, Debug)]
pub struct RollbackArgs {
    /// Number of migrations to revert, newest first
    #[arg(short = 'n', long, default_value_t = 1)]
    pub count: usize,
}

#[derive(Args, Debug, Default)]
pub struct CaptureArgs {
    /// Snapshot text; prompts when omitted on a terminal
    #[arg(short, long)]
    pub content: Option<String>,

    /// When the snapshot is about (default: now)
    #[arg(short, long)]
    pub anchor: Option<String>,

    /// Comma-separated tags
    #[arg(short, long)]
    pub tags: Option<String>,

    /// JSON object with extra fields
    #[arg(short, long)]
    pub metadata: Option<String>,
}

#[derive(Args, Debug, Default)]
pub struct SearchArgs {
    /// Full-text query
    pub query: Option<String>,

    /// Require this tag (repeatable, all must match)
    #[arg(long = "tag")]
    pub tags: Vec<String>,

    /// Accept this tag (repeatable, any may match)
    #[arg(long = "any-tag")]
    pub any_tags: Vec<String>,

    /// Earliest anchor date, inclusive
    #[arg(long)]
    pub from: Option<String>,

    /// Latest anchor date, inclusive
    #[arg(long)]
    pub to: Option<String>,

    /// Oldest first
    #[arg(long)]
    pub asc: bool,

    /// Page size (default 50, max 1000)
    #[arg(short, long)]
    pub limit: Option<usize>,

    #[arg(long, default_value_t = 0)]
    pub offset: usize,

    /// Include soft-deleted snapshots
    #[arg(long)]
    pub include_deleted: bool,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,
}

#[derive(Args, Debug)]
pub struct DeleteArgs {
    pub id: i64,
}
