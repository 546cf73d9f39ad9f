//! Ledger of applied migrations.
//!
//! One row per applied file, stored in the target database itself:
//! `(filename, hash, applied_at)`. Rows are only appended by a successful
//! apply and only removed by a rollback or a successful compensation.

use crate::error::{RunnerError, RunnerResult};
use chm_core::sql_utils::quote_literal;
use chm_core::{Config, DbType};
use chm_db::{Database, DbError, Row};
use std::collections::HashMap;

/// Name of the ledger table
pub const LEDGER_TABLE: &str = "migrations";

/// Ledger access bound to one database and cluster setting
pub struct Ledger<'a> {
    db: &'a dyn Database,
    cluster: Option<&'a str>,
}

impl<'a> Ledger<'a> {
    /// Create a ledger handle using the cluster name from `config`
    pub fn new(db: &'a dyn Database, config: &'a Config) -> Self {
        Self {
            db,
            cluster: config.cluster(),
        }
    }

    /// DDL creating the ledger table if it does not exist
    pub fn storage_ddl(&self) -> String {
        match (self.db.db_type(), self.cluster) {
            (DbType::ClickHouse, Some(cluster)) => format!(
                "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} ON CLUSTER {cluster} \
                 (filename String, hash String, applied_at DateTime DEFAULT now()) \
                 ENGINE = ReplicatedMergeTree('/clickhouse/tables/{{shard}}/{{database}}/{LEDGER_TABLE}', '{{replica}}') \
                 ORDER BY filename"
            ),
            (DbType::ClickHouse, None) => format!(
                "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} \
                 (filename String, hash String, applied_at DateTime DEFAULT now()) \
                 ENGINE = MergeTree ORDER BY filename"
            ),
            (DbType::DuckDb, _) => format!(
                "CREATE TABLE IF NOT EXISTS {LEDGER_TABLE} \
                 (filename VARCHAR PRIMARY KEY, hash VARCHAR NOT NULL, \
                 applied_at TIMESTAMP DEFAULT current_timestamp)"
            ),
        }
    }

    /// Create the ledger table when absent
    pub async fn ensure_storage(&self) -> RunnerResult<()> {
        self.db
            .execute(&self.storage_ddl())
            .await
            .map_err(|source| ledger_error("setup", source))
    }

    /// All recorded `filename -> hash` pairs.
    ///
    /// With `read_only` set a missing ledger table reads as empty instead
    /// of failing, so a dry run never has to create it.
    pub async fn read_all(&self, read_only: bool) -> RunnerResult<HashMap<String, String>> {
        if read_only
            && !self
                .db
                .relation_exists(LEDGER_TABLE)
                .await
                .map_err(|source| ledger_error("read", source))?
        {
            return Ok(HashMap::new());
        }

        let rows = self
            .db
            .query(&format!("SELECT filename, hash FROM {LEDGER_TABLE}"))
            .await
            .map_err(|source| ledger_error("read", source))?;

        rows.iter()
            .map(|row| Ok((text_column(row, "filename")?, text_column(row, "hash")?)))
            .collect()
    }

    /// Record `filename` as applied with `hash`
    pub async fn append(&self, filename: &str, hash: &str) -> RunnerResult<()> {
        let mut row = Row::new();
        row.insert("filename".to_string(), filename.into());
        row.insert("hash".to_string(), hash.into());
        self.db
            .insert_row(LEDGER_TABLE, &row)
            .await
            .map_err(|source| ledger_error("write", source))
    }

    /// Delete the entry for `filename`.
    ///
    /// On ClickHouse this is a synchronous mutation so the row is gone by
    /// the time the call returns.
    pub async fn remove(&self, filename: &str) -> RunnerResult<()> {
        let db_type = self.db.db_type();
        let literal = quote_literal(filename, db_type);
        let sql = match (db_type, self.cluster) {
            (DbType::ClickHouse, Some(cluster)) => format!(
                "ALTER TABLE {LEDGER_TABLE} ON CLUSTER {cluster} DELETE WHERE filename = {literal} SETTINGS mutations_sync = 2"
            ),
            (DbType::ClickHouse, None) => format!(
                "ALTER TABLE {LEDGER_TABLE} DELETE WHERE filename = {literal} SETTINGS mutations_sync = 2"
            ),
            (DbType::DuckDb, _) => {
                format!("DELETE FROM {LEDGER_TABLE} WHERE filename = {literal}")
            }
        };
        self.db
            .execute(&sql)
            .await
            .map_err(|source| ledger_error("delete", source))
    }
}

fn ledger_error(action: &'static str, source: DbError) -> RunnerError {
    RunnerError::Ledger { action, source }
}

fn text_column(row: &Row, column: &str) -> RunnerResult<String> {
    row.get(column)
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            ledger_error(
                "read",
                DbError::DecodeError(format!("ledger row without text column '{}'", column)),
            )
        })
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
