//! Apply engine: validate, reconcile against the ledger, execute pending
//! migrations and compensate when one of them fails.
//!
//! Recovery is not ledger-neutral: when every down-statement of an earlier
//! file in the run succeeds, that file's ledger entry is deleted so the
//! ledger again matches the database and a later run re-applies it. A file
//! whose compensation failed, or which has no rollback section, keeps its
//! entry. The failing file was never recorded, so it has nothing to remove.

use crate::compensation::{compensate, Compensation};
use crate::error::{FailurePoint, RunnerError, RunnerResult};
use crate::ledger::Ledger;
use chm_core::{check_cluster_topology, Config, MigrationFile, MigrationLoader};
use chm_db::{Database, DbError};
use std::collections::HashMap;

/// What an apply run did, or would do in a dry run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ApplyReport {
    /// Files executed and recorded by this run, in order
    pub applied: Vec<String>,
    /// Files already recorded with a matching hash
    pub skipped: Vec<String>,
    /// Files that were pending when the run started
    pub pending: Vec<String>,
    pub dry_run: bool,
}

/// Files split by ledger state
#[derive(Debug)]
pub struct Reconciliation<'f> {
    pub pending: Vec<&'f MigrationFile>,
    pub skipped: Vec<&'f MigrationFile>,
}

/// Compare every file with the ledger before anything runs.
///
/// A recorded hash that differs from the file's current hash is drift and
/// fails the whole run. Ledger entries without a file are ignored.
pub fn reconcile<'f>(
    files: &'f [MigrationFile],
    ledger: &HashMap<String, String>,
) -> RunnerResult<Reconciliation<'f>> {
    let mut plan = Reconciliation {
        pending: Vec::new(),
        skipped: Vec::new(),
    };
    for file in files {
        match ledger.get(&file.filename) {
            None => plan.pending.push(file),
            Some(recorded) if *recorded == file.content_hash => plan.skipped.push(file),
            Some(recorded) => {
                return Err(RunnerError::Drift {
                    filename: file.filename.clone(),
                    recorded: recorded.clone(),
                    current: file.content_hash.clone(),
                })
            }
        }
    }
    Ok(plan)
}

/// Applies pending migrations from a loader to a database
pub struct ApplyEngine<'a> {
    db: &'a dyn Database,
    loader: &'a MigrationLoader,
    config: &'a Config,
}

impl<'a> ApplyEngine<'a> {
    pub fn new(db: &'a dyn Database, loader: &'a MigrationLoader, config: &'a Config) -> Self {
        Self { db, loader, config }
    }

    /// Run `migration:up`.
    ///
    /// Loading, topology validation and drift detection all finish before
    /// the first statement executes. A dry run stops after reconciliation
    /// and never writes, not even the ledger table.
    pub async fn apply(&self, dry_run: bool) -> RunnerResult<ApplyReport> {
        let files = self.loader.load()?;
        log::debug!(
            "Loaded {} migration(s) from {}",
            files.len(),
            self.loader.dir().display()
        );

        if let Some(cluster) = self.config.cluster() {
            check_cluster_topology(&files, cluster).map_err(RunnerError::Validation)?;
        }

        let ledger = Ledger::new(self.db, self.config);
        if !dry_run {
            ledger.ensure_storage().await?;
        }
        let recorded = ledger.read_all(dry_run).await?;
        let plan = reconcile(&files, &recorded)?;

        let mut report = ApplyReport {
            skipped: names(&plan.skipped),
            pending: names(&plan.pending),
            dry_run,
            ..ApplyReport::default()
        };
        for file in &plan.skipped {
            log::debug!("Skipping {}, already applied", file.filename);
        }

        if dry_run {
            for file in &plan.pending {
                log::info!("Would apply {}", file.filename);
            }
            return Ok(report);
        }

        let mut applied: Vec<&MigrationFile> = Vec::new();
        for file in plan.pending {
            log::info!("Applying {}...", file.filename);
            if let Err((at, source)) = self.run_file(file, &ledger).await {
                log::error!("Error applying {}, rolling back...", file.filename);
                let compensations = self.recover(file, &applied, &ledger).await;
                return Err(RunnerError::Execution {
                    filename: file.filename.clone(),
                    at,
                    source,
                    compensations,
                });
            }
            applied.push(file);
            report.applied.push(file.filename.clone());
        }

        Ok(report)
    }

    /// Execute a file's up-statements in order, then record it.
    async fn run_file(
        &self,
        file: &MigrationFile,
        ledger: &Ledger<'_>,
    ) -> Result<(), (FailurePoint, DbError)> {
        for (idx, statement) in file.up_statements.iter().enumerate() {
            self.db
                .execute(statement)
                .await
                .map_err(|e| (FailurePoint::Statement(idx + 1), e))?;
        }
        ledger
            .append(&file.filename, &file.content_hash)
            .await
            .map_err(|e| match e {
                RunnerError::Ledger { source, .. } => (FailurePoint::LedgerWrite, source),
                other => (
                    FailurePoint::LedgerWrite,
                    DbError::ExecutionError(other.to_string()),
                ),
            })
    }

    /// Undo the failed file, then every file applied earlier in this run,
    /// newest first.
    ///
    /// Earlier files whose down-statements all succeed lose their ledger
    /// entry; anything else keeps it so the ledger still reflects what is
    /// in the database.
    async fn recover(
        &self,
        failed: &MigrationFile,
        applied: &[&MigrationFile],
        ledger: &Ledger<'_>,
    ) -> Vec<Compensation> {
        let mut compensations = Vec::with_capacity(applied.len() + 1);
        compensations.push(Compensation {
            filename: failed.filename.clone(),
            outcome: compensate(self.db, failed).await,
            ledger_entry_removed: false,
        });

        for file in applied.iter().rev() {
            let outcome = compensate(self.db, file).await;
            let ledger_entry_removed = if outcome.is_success() {
                match ledger.remove(&file.filename).await {
                    Ok(()) => true,
                    Err(e) => {
                        log::warn!("Could not remove ledger entry for {}: {}", file.filename, e);
                        false
                    }
                }
            } else {
                false
            };
            compensations.push(Compensation {
                filename: file.filename.clone(),
                outcome,
                ledger_entry_removed,
            });
        }
        compensations
    }
}

fn names(files: &[&MigrationFile]) -> Vec<String> {
    files.iter().map(|f| f.filename.clone()).collect()
}

#[cfg(test)]
#[path = "engine_test.rs"]
mod tests;
