//! DuckDB database backend implementation

use crate::error::{DbError, DbResult};
use crate::traits::{Database, Row};
use async_trait::async_trait;
use chm_core::sql_utils::{quote_ident, quote_literal};
use chm_core::DbType;
use duckdb::types::Value;
use duckdb::{AccessMode, Config as DuckDbConfig, Connection};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

/// DuckDB database backend
pub struct DuckDbBackend {
    conn: Mutex<Connection>,
}

impl DuckDbBackend {
    /// Create a new in-memory DuckDB connection
    pub fn in_memory() -> DbResult<Self> {
        let conn =
            Connection::open_in_memory().map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create a new DuckDB connection from a file path
    pub fn from_path(path: &Path) -> DbResult<Self> {
        let conn = Connection::open(path).map_err(|e| DbError::ConnectionError(e.to_string()))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an existing database file without write access.
    ///
    /// Fails when the file does not exist instead of creating it.
    pub fn open_read_only(path: &Path) -> DbResult<Self> {
        let config = DuckDbConfig::default()
            .access_mode(AccessMode::ReadOnly)
            .map_err(|e| DbError::ConnectionError(e.to_string()))?;
        let conn = Connection::open_with_flags(path, config)
            .map_err(|e| DbError::ConnectionError(format!("{}: {}", path.display(), e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create from path string (handles :memory: special case)
    pub fn new(path: &str) -> DbResult<Self> {
        if path == ":memory:" {
            Self::in_memory()
        } else {
            Self::from_path(Path::new(path))
        }
    }

    fn lock(&self) -> DbResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| DbError::MutexPoisoned(e.to_string()))
    }

    /// Execute SQL synchronously
    fn execute_sync(&self, sql: &str) -> DbResult<()> {
        log::debug!("duckdb: {}", sql);
        let conn = self.lock()?;
        conn.execute_batch(sql)
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))
    }

    /// Query rows synchronously
    fn query_sync(&self, sql: &str) -> DbResult<Vec<Row>> {
        log::debug!("duckdb: {}", sql);
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(sql)
            .map_err(|e| DbError::ExecutionError(format!("{}: {}", e, sql)))?;
        let mut rows = stmt.query([])?;
        let columns = rows
            .as_ref()
            .map(|s| {
                s.column_names()
                    .into_iter()
                    .map(|n| n.to_string())
                    .collect::<Vec<String>>()
            })
            .unwrap_or_default();

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let mut record = Row::new();
            for (idx, name) in columns.iter().enumerate() {
                let value: Value = row.get(idx)?;
                record.insert(name.clone(), to_json(value));
            }
            out.push(record);
        }
        Ok(out)
    }

    /// Check if relation exists synchronously
    fn relation_exists_sync(&self, name: &str) -> DbResult<bool> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT COUNT(*) FROM information_schema.tables WHERE table_schema = current_schema() AND table_name = {}",
            quote_literal(name, DbType::DuckDb)
        );
        let count: i64 = conn
            .query_row(&sql, [], |row| row.get(0))
            .map_err(|e| DbError::ExecutionError(e.to_string()))?;
        Ok(count > 0)
    }
}

/// Convert a DuckDB value to JSON; types without a JSON counterpart are
/// rendered with their debug representation.
fn to_json(value: Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Boolean(b) => b.into(),
        Value::TinyInt(i) => i.into(),
        Value::SmallInt(i) => i.into(),
        Value::Int(i) => i.into(),
        Value::BigInt(i) => i.into(),
        Value::UTinyInt(i) => i.into(),
        Value::USmallInt(i) => i.into(),
        Value::UInt(i) => i.into(),
        Value::UBigInt(i) => i.into(),
        Value::Float(f) => f.into(),
        Value::Double(f) => f.into(),
        Value::Text(s) => s.into(),
        other => format!("{:?}", other).into(),
    }
}

/// Render a JSON value as a DuckDB SQL literal
fn to_literal(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => "NULL".to_string(),
        serde_json::Value::Bool(b) => b.to_string().to_uppercase(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => quote_literal(s, DbType::DuckDb),
        other => quote_literal(&other.to_string(), DbType::DuckDb),
    }
}

#[async_trait]
impl Database for DuckDbBackend {
    async fn execute(&self, sql: &str) -> DbResult<()> {
        self.execute_sync(sql)
    }

    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        self.query_sync(sql)
    }

    async fn insert_row(&self, table: &str, row: &Row) -> DbResult<()> {
        let columns: Vec<String> = row
            .keys()
            .map(|k| quote_ident(k, DbType::DuckDb))
            .collect();
        let values: Vec<String> = row.values().map(to_literal).collect();
        let sql = format!(
            "INSERT INTO {} ({}) VALUES ({})",
            quote_ident(table, DbType::DuckDb),
            columns.join(", "),
            values.join(", ")
        );
        self.execute_sync(&sql)
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        self.relation_exists_sync(name)
    }

    fn db_type(&self) -> DbType {
        DbType::DuckDb
    }
}

#[cfg(test)]
#[path = "duckdb_test.rs"]
mod tests;
