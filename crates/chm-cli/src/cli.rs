//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// chm - versioned schema migrations for ClickHouse and DuckDB
#[derive(Parser, Debug)]
#[command(name = "chm")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding ch-migration.json; relative paths resolve against it
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create an empty timestamped migration file
    #[command(name = "migration:create")]
    Create(CreateArgs),

    /// Apply every pending migration in order
    #[command(name = "migration:up")]
    Up(UpArgs),

    /// Roll back a single migration by filename
    #[command(name = "migration:down")]
    Down(DownArgs),

    /// Write the current schema as idempotent DDL
    Dump(DumpArgs),
}

/// Arguments for the migration:create command
#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Migration name, e.g. create_events
    pub name: String,

    /// Migrations directory (default: `path` in ch-migration.json)
    #[arg(long)]
    pub path: Option<String>,
}

/// Arguments for the migration:up command
#[derive(Args, Debug)]
pub struct UpArgs {
    /// Migrations directory (default: `path` in ch-migration.json)
    #[arg(long)]
    pub path: Option<String>,

    /// Report pending migrations without executing anything
    #[arg(long)]
    pub dry_run: bool,
}

/// Arguments for the migration:down command
#[derive(Args, Debug)]
pub struct DownArgs {
    /// Filename of the migration to roll back
    #[arg(long)]
    pub file: String,

    /// Migrations directory (default: `path` in ch-migration.json)
    #[arg(long)]
    pub path: Option<String>,
}

/// Arguments for the dump command
#[derive(Args, Debug)]
pub struct DumpArgs {
    /// Output file
    #[arg(long)]
    pub out: PathBuf,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
