//! Best-effort undo of migrations after a failed apply run.

use chm_core::MigrationFile;
use chm_db::Database;

/// A down-statement that failed during compensation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatementFailure {
    pub statement: String,
    pub error: String,
}

/// Result of undoing one file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CompensationOutcome {
    /// Every down-statement succeeded
    Succeeded,
    /// At least one down-statement failed; the rest were still attempted
    Failed { failures: Vec<StatementFailure> },
    /// The file has no down-statements, its effects stay in place
    NothingToUndo,
}

impl CompensationOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CompensationOutcome::Succeeded)
    }
}

/// Compensation record for one file of a failed run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compensation {
    pub filename: String,
    pub outcome: CompensationOutcome,
    /// Whether the file's ledger entry was deleted afterwards
    pub ledger_entry_removed: bool,
}

/// Run `file`'s down-statements in reverse order.
///
/// A failing statement is logged and recorded, then the remaining ones are
/// attempted anyway. Never returns an error.
pub async fn compensate(db: &dyn Database, file: &MigrationFile) -> CompensationOutcome {
    if !file.has_rollback() {
        log::warn!(
            "No rollback SQL in {}, its changes were left in place",
            file.filename
        );
        return CompensationOutcome::NothingToUndo;
    }

    log::info!("Rolling back {}...", file.filename);
    let mut failures = Vec::new();
    for statement in file.down_statements.iter().rev() {
        if let Err(e) = db.execute(statement).await {
            log::warn!("Rollback statement failed in {}: {}", file.filename, e);
            failures.push(StatementFailure {
                statement: statement.clone(),
                error: e.to_string(),
            });
        }
    }

    if failures.is_empty() {
        CompensationOutcome::Succeeded
    } else {
        CompensationOutcome::Failed { failures }
    }
}
