//! `migration:down`: undo a single named migration.

use crate::error::{RunnerError, RunnerResult};
use crate::ledger::Ledger;
use chm_core::{Config, MigrationFile, MigrationLoader};
use chm_db::Database;

/// Rolls back one migration file by name
pub struct RollbackCommand<'a> {
    db: &'a dyn Database,
    loader: &'a MigrationLoader,
    config: &'a Config,
}

impl<'a> RollbackCommand<'a> {
    pub fn new(db: &'a dyn Database, loader: &'a MigrationLoader, config: &'a Config) -> Self {
        Self { db, loader, config }
    }

    /// Execute the down-statements of `filename` in reverse order, then
    /// delete its ledger entry.
    ///
    /// The file and its rollback section are checked before the database
    /// is touched. Other migrations are neither loaded nor validated.
    pub async fn rollback(&self, filename: &str) -> RunnerResult<()> {
        let file = locate(self.loader, filename)?;
        self.rollback_file(&file).await
    }

    /// Roll back an already located file.
    ///
    /// The statements and the ledger delete are not atomic: if the delete
    /// fails after the statements ran, the entry has to be removed by hand.
    pub async fn rollback_file(&self, file: &MigrationFile) -> RunnerResult<()> {
        if !file.has_rollback() {
            return Err(no_rollback(file));
        }

        let ledger = Ledger::new(self.db, self.config);
        ledger.ensure_storage().await?;

        log::info!("Rolling back {}...", file.filename);
        for (idx, statement) in file.down_statements.iter().enumerate().rev() {
            self.db
                .execute(statement)
                .await
                .map_err(|source| RunnerError::RollbackFailed {
                    filename: file.filename.clone(),
                    statement: idx + 1,
                    source,
                })?;
        }

        ledger.remove(&file.filename).await?;
        log::debug!("Removed ledger entry for {}", file.filename);
        Ok(())
    }
}

/// Find `filename` and make sure it can be rolled back, without any
/// database access
pub fn locate(loader: &MigrationLoader, filename: &str) -> RunnerResult<MigrationFile> {
    let file = loader
        .find(filename)?
        .ok_or_else(|| RunnerError::NotFound {
            filename: filename.to_string(),
        })?;
    if !file.has_rollback() {
        return Err(no_rollback(&file));
    }
    Ok(file)
}

fn no_rollback(file: &MigrationFile) -> RunnerError {
    RunnerError::NoRollback {
        filename: file.filename.clone(),
    }
}

#[cfg(test)]
#[path = "rollback_test.rs"]
mod tests;
