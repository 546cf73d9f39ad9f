//! chm-runner - Migration engine for chm
//!
//! Reconciles migration files against the ledger stored in the target
//! database, applies pending files in order, compensates failed runs and
//! provides the single-file rollback and schema dump commands.

pub mod compensation;
pub mod dump;
pub mod engine;
pub mod error;
pub mod ledger;
pub mod rollback;

pub use compensation::{Compensation, CompensationOutcome, StatementFailure};
pub use dump::{dump_schema, make_idempotent, render_dump, schema_statements, write_dump};
pub use engine::{reconcile, ApplyEngine, ApplyReport, Reconciliation};
pub use error::{FailurePoint, RunnerError, RunnerResult};
pub use ledger::{Ledger, LEDGER_TABLE};
pub use rollback::{locate, RollbackCommand};
