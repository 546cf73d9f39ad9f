//! SQL literal helpers for statements the runner builds itself.

use crate::config::DbType;

/// Quote a value as a SQL string literal for the given backend.
///
/// ClickHouse treats backslash as an escape character inside string
/// literals, so it is doubled there; DuckDB follows the SQL standard where
/// only the quote itself needs doubling.
///
/// # Examples
/// ```
/// use chm_core::config::DbType;
/// use chm_core::sql_utils::quote_literal;
/// assert_eq!(quote_literal("it's", DbType::DuckDb), "'it''s'");
/// assert_eq!(quote_literal(r"a\b", DbType::ClickHouse), r"'a\\b'");
/// ```
pub fn quote_literal(value: &str, db_type: DbType) -> String {
    let escaped = match db_type {
        DbType::ClickHouse => value.replace('\\', "\\\\").replace('\'', "\\'"),
        DbType::DuckDb => value.replace('\'', "''"),
    };
    format!("'{}'", escaped)
}

/// Quote an identifier for the given backend.
///
/// ClickHouse uses backticks, DuckDB uses double quotes; embedded quote
/// characters are doubled.
pub fn quote_ident(ident: &str, db_type: DbType) -> String {
    match db_type {
        DbType::ClickHouse => format!("`{}`", ident.replace('`', "``")),
        DbType::DuckDb => format!("\"{}\"", ident.replace('"', "\"\"")),
    }
}
