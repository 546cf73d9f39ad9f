//! Database trait definition

use crate::error::DbResult;
use async_trait::async_trait;
use chm_core::DbType;

/// One result row, keyed by column name
pub type Row = serde_json::Map<String, serde_json::Value>;

/// Database abstraction trait for chm
///
/// The runner only ever issues one call at a time and awaits it before the
/// next, so implementations need no internal queueing. Implementations must
/// be Send + Sync for async operation.
#[async_trait]
pub trait Database: Send + Sync {
    /// Execute a statement that returns no rows (DDL/DML)
    async fn execute(&self, sql: &str) -> DbResult<()>;

    /// Execute a query and return its rows
    async fn query(&self, sql: &str) -> DbResult<Vec<Row>>;

    /// Insert a single row into `table`
    async fn insert_row(&self, table: &str, row: &Row) -> DbResult<()>;

    /// Check if a table or view exists in the working database
    async fn relation_exists(&self, name: &str) -> DbResult<bool>;

    /// Backend type, used to pick SQL dialect
    fn db_type(&self) -> DbType;
}
