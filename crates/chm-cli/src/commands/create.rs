//! migration:create command implementation

use anyhow::{bail, Context, Result};
use chm_core::migration::{migration_template, new_migration_filename};
use chrono::Utc;
use std::fs;

use crate::cli::{CreateArgs, GlobalArgs};
use crate::commands::common::migrations_dir;

/// Execute the migration:create command
pub async fn execute(args: &CreateArgs, global: &GlobalArgs) -> Result<()> {
    let dir = migrations_dir(global, args.path.as_deref())?;
    let filename = new_migration_filename(&args.name, Utc::now())?;

    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create directory: {}", dir.display()))?;
    let path = dir.join(&filename);
    if path.exists() {
        bail!("Migration already exists: {}", path.display());
    }
    fs::write(&path, migration_template(&filename))
        .with_context(|| format!("Failed to write migration: {}", path.display()))?;

    println!("Created migration: {}", path.display());
    Ok(())
}

#[cfg(test)]
#[path = "create_test.rs"]
mod tests;
