//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use chm_core::{Config, MigrationLoader, ProjectFile};
use chm_db::Database;
use std::path::PathBuf;
use std::sync::Arc;

use crate::cli::GlobalArgs;

/// Resolve the migrations directory from `--path` or `ch-migration.json`.
///
/// Relative paths are taken relative to `--project-dir`.
pub(crate) fn migrations_dir(global: &GlobalArgs, cli_path: Option<&str>) -> Result<PathBuf> {
    let project = ProjectFile::load_from_dir(&global.project_dir)?;
    let path = project.resolve_migrations_path(cli_path)?;
    Ok(global.project_dir.join(path))
}

/// Read the `CH_*` environment once
pub(crate) fn load_config() -> Result<Config> {
    Ok(Config::from_env()?)
}

/// Open the configured database backend
pub(crate) fn connect(config: &Config) -> Result<Arc<dyn Database>> {
    let target = config.target()?;
    log::debug!("Connecting to {} backend", config.backend);
    chm_db::connect(&target).context("Failed to connect to database")
}

/// Open the configured backend without creating or writing anything
pub(crate) fn connect_read_only(config: &Config) -> Result<Arc<dyn Database>> {
    let target = config.target()?;
    log::debug!("Connecting to {} backend (read-only)", config.backend);
    chm_db::connect_read_only(&target).context("Failed to connect to database")
}

/// Config, loader and connection for commands that read migrations
pub(crate) fn setup(
    global: &GlobalArgs,
    cli_path: Option<&str>,
    read_only: bool,
) -> Result<(Config, MigrationLoader, Arc<dyn Database>)> {
    let config = load_config()?;
    let dir = migrations_dir(global, cli_path)?;
    let loader = MigrationLoader::new(dir, &config);
    let db = if read_only {
        connect_read_only(&config)?
    } else {
        connect(&config)?
    };
    Ok((config, loader, db))
}

/// Point the `CH_*` environment at a DuckDB file. Callers must be `#[serial]`.
#[cfg(test)]
pub(crate) fn use_duckdb_env(db_path: &std::path::Path) {
    std::env::set_var("CH_BACKEND", "duckdb");
    std::env::set_var("CH_DB", db_path);
    std::env::remove_var("CH_CLUSTER");
}

#[cfg(test)]
#[path = "common_test.rs"]
mod tests;
