//! Command-line interface definitions and dispatch.

pub mod commands;
pub mod csv;

use crate::error::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::model::IssueType;

/// Import normalization and sprint aggregation for issue-tracker CSV exports.
#[derive(Debug, Parser)]
#[command(name = "stride", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Path to the database file (overrides workspace discovery)
    #[arg(long, global = true, env = "STRIDE_DB")]
    pub db: Option<PathBuf>,

    /// Emit JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all logs except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Initialize a stride workspace in the current directory
    Init,
    /// Dry-run an import file: classify rows without writing
    Preview(ImportArgs),
    /// Commit an import file into the store
    Import(ImportArgs),
    /// Show statistics for one sprint
    Sprint(SprintArgs),
    /// Show recent import batches
    Log(LogArgs),
}

#[derive(Debug, clap::Args)]
pub struct ImportArgs {
    /// CSV export file to read
    pub file: PathBuf,

    /// Issue type the file contains (epic, story, bug, subtask)
    #[arg(short = 't', long = "type")]
    pub issue_type: IssueType,

    /// Fallback project key for rows missing one
    #[arg(long)]
    pub project: Option<String>,

    /// Team to attach to every row in the batch
    #[arg(long)]
    pub team: Option<String>,
}

#[derive(Debug, clap::Args)]
pub struct SprintArgs {
    /// Sprint name, matched exactly and case-sensitively
    pub name: String,
}

#[derive(Debug, clap::Args)]
pub struct LogArgs {
    /// Maximum number of batches to show
    #[arg(long, default_value_t = 20)]
    pub limit: usize,
}

/// Dispatch a parsed command line.
///
/// # Errors
///
/// Returns the first error from the executed command.
pub fn run(cli: &Cli) -> Result<()> {
    match &cli.command {
        Commands::Init => commands::init::execute(cli.json),
        Commands::Preview(args) => commands::preview::execute(args, cli.json, cli.db.as_ref()),
        Commands::Import(args) => commands::import::execute(args, cli.json, cli.db.as_ref()),
        Commands::Sprint(args) => commands::sprint::execute(args, cli.json, cli.db.as_ref()),
        Commands::Log(args) => commands::log::execute(args, cli.json, cli.db.as_ref()),
    }
}
