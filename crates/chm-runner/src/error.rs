//! Error types for chm-runner

use crate::compensation::Compensation;
use chm_core::{CoreError, TopologyViolation};
use chm_db::DbError;
use std::fmt;
use thiserror::Error;

/// Where inside a migration the apply run stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePoint {
    /// 1-based index into the file's up-statements
    Statement(usize),
    /// All statements ran but the ledger entry could not be written
    LedgerWrite,
}

impl fmt::Display for FailurePoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailurePoint::Statement(n) => write!(f, "statement {}", n),
            FailurePoint::LedgerWrite => write!(f, "ledger write"),
        }
    }
}

/// Runner error type
#[derive(Error, Debug)]
pub enum RunnerError {
    /// Configuration or migration loading error
    #[error(transparent)]
    Core(#[from] CoreError),

    /// R001: Cluster topology rule violated; nothing was executed
    #[error("[R001] Cluster validation failed: {0}")]
    Validation(TopologyViolation),

    /// R002: Ledger hash differs from the file on disk; nothing was executed
    #[error("[R002] Hash mismatch: {filename} (ledger {recorded}, file {current})")]
    Drift {
        filename: String,
        recorded: String,
        current: String,
    },

    /// R003: A migration failed during apply.
    ///
    /// Best-effort compensation has already run when this is returned; its
    /// outcome is carried in `compensations`, the message is always the
    /// original failure.
    #[error("[R003] Migration {filename} failed at {at}: {source}")]
    Execution {
        filename: String,
        at: FailurePoint,
        source: DbError,
        compensations: Vec<Compensation>,
    },

    /// R004: Rollback target does not exist
    #[error("[R004] Migration file not found: {filename}")]
    NotFound { filename: String },

    /// R005: Rollback target has no down-statements
    #[error("[R005] No rollback SQL found in {filename}")]
    NoRollback { filename: String },

    /// R006: Rollback statement failed; the ledger entry was kept
    #[error("[R006] Rollback of {filename} failed at statement {statement}: {source}")]
    RollbackFailed {
        filename: String,
        statement: usize,
        source: DbError,
    },

    /// R007: Ledger storage could not be read or written
    #[error("[R007] Ledger {action} failed: {source}")]
    Ledger {
        action: &'static str,
        source: DbError,
    },

    /// R008: Schema listing failed
    #[error("[R008] Schema dump failed: {0}")]
    Dump(DbError),

    /// R009: Dump output could not be written
    #[error("[R009] Failed to write '{path}': {source}")]
    DumpWrite {
        path: String,
        source: std::io::Error,
    },
}

impl RunnerError {
    /// Compensation records of a failed apply run, empty for other errors
    pub fn compensations(&self) -> &[Compensation] {
        match self {
            RunnerError::Execution { compensations, .. } => compensations,
            _ => &[],
        }
    }
}

/// Result type alias for RunnerError
pub type RunnerResult<T> = Result<T, RunnerError>;
