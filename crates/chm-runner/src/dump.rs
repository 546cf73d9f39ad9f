//! Schema dump: the current database objects as idempotent DDL.

use crate::error::{RunnerError, RunnerResult};
use crate::ledger::LEDGER_TABLE;
use chm_core::DbType;
use chm_db::{Database, DbError};
use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

static CREATE_OBJECT_RE: OnceLock<Regex> = OnceLock::new();
static IF_NOT_EXISTS_RE: OnceLock<Regex> = OnceLock::new();

fn create_object_regex() -> &'static Regex {
    CREATE_OBJECT_RE.get_or_init(|| {
        Regex::new(r"(?i)^CREATE\s+(?:TABLE|VIEW|MATERIALIZED\s+VIEW|DICTIONARY)\s+")
            .expect("valid regex")
    })
}

fn if_not_exists_regex() -> &'static Regex {
    IF_NOT_EXISTS_RE
        .get_or_init(|| Regex::new(r"(?i)^IF\s+NOT\s+EXISTS\b").expect("valid regex"))
}

/// Query listing `(name, create_table_query)` for every user object in the
/// current database, ledger excluded
fn listing_query(db_type: DbType) -> String {
    match db_type {
        DbType::ClickHouse => format!(
            "SELECT name, create_table_query FROM system.tables \
             WHERE database = currentDatabase() AND name != '{LEDGER_TABLE}' \
             AND NOT is_temporary AND NOT startsWith(name, '.inner') ORDER BY name"
        ),
        DbType::DuckDb => format!(
            "SELECT table_name AS name, sql AS create_table_query FROM duckdb_tables() \
             WHERE NOT internal AND NOT temporary AND schema_name = current_schema() \
             AND table_name <> '{LEDGER_TABLE}' \
             UNION ALL \
             SELECT view_name AS name, sql AS create_table_query FROM duckdb_views() \
             WHERE NOT internal AND NOT temporary AND schema_name = current_schema() \
             ORDER BY name"
        ),
    }
}

/// Rewrite a `CREATE` statement so it can be replayed on a database that
/// already has the object.
///
/// `CREATE TABLE x` becomes `CREATE TABLE IF NOT EXISTS x`, likewise for
/// views, materialized views and dictionaries. Statements that already say
/// `IF NOT EXISTS` or `OR REPLACE` are kept. The result always ends in `;`.
pub fn make_idempotent(create: &str) -> String {
    let create = create.trim();
    let mut out = match create_object_regex().find(create) {
        Some(m) if !if_not_exists_regex().is_match(&create[m.end()..]) => format!(
            "{} IF NOT EXISTS {}",
            create[..m.end()].trim_end(),
            &create[m.end()..]
        ),
        _ => create.to_string(),
    };
    if !out.ends_with(';') {
        out.push(';');
    }
    out
}

/// Idempotent `CREATE` statements for every object, ordered by name
pub async fn schema_statements(db: &dyn Database) -> RunnerResult<Vec<String>> {
    let rows = db
        .query(&listing_query(db.db_type()))
        .await
        .map_err(RunnerError::Dump)?;

    let mut statements = Vec::with_capacity(rows.len());
    for row in &rows {
        let create = row
            .get("create_table_query")
            .and_then(|v| v.as_str())
            .ok_or_else(|| {
                RunnerError::Dump(DbError::DecodeError(
                    "schema row without create_table_query".to_string(),
                ))
            })?;
        if create.trim().is_empty() {
            log::debug!(
                "Skipping {} without a CREATE statement",
                row.get("name").and_then(|v| v.as_str()).unwrap_or("?")
            );
            continue;
        }
        statements.push(make_idempotent(create));
    }
    Ok(statements)
}

/// Join statements into a script, separated by a blank line.
///
/// No statements yield an empty string.
pub fn render_dump(statements: &[String]) -> String {
    if statements.is_empty() {
        return String::new();
    }
    format!("{}\n", statements.join("\n\n"))
}

/// Render the schema of the connected database as a SQL script
pub async fn dump_schema(db: &dyn Database) -> RunnerResult<String> {
    Ok(render_dump(&schema_statements(db).await?))
}

/// Dump the schema into `path`, returning the number of objects written
pub async fn write_dump(db: &dyn Database, path: &Path) -> RunnerResult<usize> {
    let statements = schema_statements(db).await?;
    std::fs::write(path, render_dump(&statements)).map_err(|source| RunnerError::DumpWrite {
        path: path.display().to_string(),
        source,
    })?;
    Ok(statements.len())
}

#[cfg(test)]
#[path = "dump_test.rs"]
mod tests;
