//! chm-db - Database abstraction layer for chm
//!
//! This crate provides the `Database` trait and implementations for
//! ClickHouse (over its HTTP interface) and embedded DuckDB.

pub mod clickhouse;
pub mod duckdb;
pub mod error;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
pub mod traits;

pub use clickhouse::ClickHouseBackend;
pub use duckdb::DuckDbBackend;
pub use error::{DbError, DbResult};
pub use traits::{Database, Row};

use chm_core::ConnectionTarget;
use std::path::Path;
use std::sync::Arc;

/// Open the backend selected by a validated connection target.
pub fn connect(target: &ConnectionTarget) -> DbResult<Arc<dyn Database>> {
    match target {
        ConnectionTarget::ClickHouse(conn) => Ok(Arc::new(ClickHouseBackend::new(conn.clone())?)),
        ConnectionTarget::DuckDb { path } => Ok(Arc::new(DuckDbBackend::new(path)?)),
    }
}

/// Open the backend for a run that must not write.
///
/// A DuckDB file is opened read-only; when it does not exist yet an empty
/// in-memory database stands in for it, so nothing is created on disk.
pub fn connect_read_only(target: &ConnectionTarget) -> DbResult<Arc<dyn Database>> {
    match target {
        ConnectionTarget::DuckDb { path } if path != ":memory:" => {
            let file = Path::new(path);
            if file.exists() {
                Ok(Arc::new(DuckDbBackend::open_read_only(file)?))
            } else {
                log::debug!("{} does not exist, reading an empty database", path);
                Ok(Arc::new(DuckDbBackend::in_memory()?))
            }
        }
        _ => connect(target),
    }
}
