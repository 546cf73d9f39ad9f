//! In-memory database double for runner tests.
//!
//! Records every statement it receives and keeps just enough state to
//! observe migrations: which tables exist, and the rows inserted through
//! [`Database::insert_row`]. Statements matching a registered failure
//! pattern return an execution error instead.

use crate::error::{DbError, DbResult};
use crate::traits::{Database, Row};
use async_trait::async_trait;
use chm_core::DbType;
use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Mutex, MutexGuard, OnceLock};

static CREATE_RE: OnceLock<Regex> = OnceLock::new();
static DROP_RE: OnceLock<Regex> = OnceLock::new();
static DELETE_RE: OnceLock<Regex> = OnceLock::new();

fn create_regex() -> &'static Regex {
    CREATE_RE.get_or_init(|| {
        Regex::new(
            r"(?i)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?(?:TABLE|VIEW|MATERIALIZED\s+VIEW)\s+(IF\s+NOT\s+EXISTS\s+)?([^\s(]+)",
        )
        .expect("valid regex")
    })
}

fn drop_regex() -> &'static Regex {
    DROP_RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*DROP\s+(?:TABLE|VIEW)\s+(IF\s+EXISTS\s+)?([^\s;]+)").expect("valid regex")
    })
}

fn delete_regex() -> &'static Regex {
    DELETE_RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*(?:ALTER\s+TABLE\s+(\S+).*\bDELETE|DELETE\s+FROM\s+(\S+))\s+WHERE\s+filename\s*=\s*'([^']*)'")
            .expect("valid regex")
    })
}

/// Strip identifier quotes so `"migrations"` and `migrations` match
fn bare(name: &str) -> String {
    name.trim_matches(|c| c == '`' || c == '"').to_string()
}

#[derive(Default)]
struct MockState {
    executed: Vec<String>,
    queries: Vec<String>,
    tables: BTreeSet<String>,
    rows: BTreeMap<String, Vec<Row>>,
    fail_patterns: Vec<String>,
    relations: Vec<Row>,
}

/// Recording in-memory [`Database`]
pub struct MockDatabase {
    db_type: DbType,
    state: Mutex<MockState>,
}

impl Default for MockDatabase {
    fn default() -> Self {
        Self::new(DbType::ClickHouse)
    }
}

impl MockDatabase {
    /// Create an empty mock speaking the given dialect
    pub fn new(db_type: DbType) -> Self {
        Self {
            db_type,
            state: Mutex::new(MockState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().expect("mock state mutex poisoned")
    }

    /// Fail every statement containing `pattern`
    pub fn fail_on(self, pattern: impl Into<String>) -> Self {
        self.state().fail_patterns.push(pattern.into());
        self
    }

    /// Stop failing statements containing `pattern`
    pub fn clear_failure(&self, pattern: &str) {
        self.state().fail_patterns.retain(|p| p != pattern);
    }

    /// Rows returned for schema listing queries (`system.tables`,
    /// `duckdb_tables()`)
    pub fn with_relations(self, relations: &[(&str, &str)]) -> Self {
        {
            let mut state = self.state();
            state.relations = relations
                .iter()
                .map(|(name, create)| {
                    let mut row = Row::new();
                    row.insert("name".to_string(), (*name).into());
                    row.insert("create_table_query".to_string(), (*create).into());
                    row
                })
                .collect();
        }
        self
    }

    /// Every statement passed to `execute`, in order
    pub fn executed(&self) -> Vec<String> {
        self.state().executed.clone()
    }

    /// Every statement passed to `query`, in order
    pub fn queries(&self) -> Vec<String> {
        self.state().queries.clone()
    }

    /// Rows inserted into `table` and not deleted since
    pub fn rows(&self, table: &str) -> Vec<Row> {
        self.state().rows.get(table).cloned().unwrap_or_default()
    }

    /// Whether a table or view named `name` currently exists
    pub fn has_table(&self, name: &str) -> bool {
        self.state().tables.contains(name)
    }

    /// Forget all recorded statements, keeping tables and rows
    pub fn clear_log(&self) {
        let mut state = self.state();
        state.executed.clear();
        state.queries.clear();
    }

    fn apply(state: &mut MockState, sql: &str) -> DbResult<()> {
        if let Some(caps) = create_regex().captures(sql) {
            let name = bare(&caps[2]);
            if !state.tables.insert(name.clone()) && caps.get(1).is_none() {
                return Err(DbError::ExecutionError(format!(
                    "Table {} already exists: {}",
                    name, sql
                )));
            }
        } else if let Some(caps) = drop_regex().captures(sql) {
            let name = bare(&caps[2]);
            if !state.tables.remove(&name) && caps.get(1).is_none() {
                return Err(DbError::ExecutionError(format!(
                    "Table {} doesn't exist: {}",
                    name, sql
                )));
            }
            state.rows.remove(&name);
        } else if let Some(caps) = delete_regex().captures(sql) {
            let table = bare(caps.get(1).or(caps.get(2)).map_or("", |m| m.as_str()));
            let filename = caps[3].to_string();
            if let Some(rows) = state.rows.get_mut(&table) {
                rows.retain(|r| r.get("filename").and_then(|v| v.as_str()) != Some(filename.as_str()));
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Database for MockDatabase {
    async fn execute(&self, sql: &str) -> DbResult<()> {
        let mut state = self.state();
        state.executed.push(sql.to_string());
        if state.fail_patterns.iter().any(|p| sql.contains(p.as_str())) {
            return Err(DbError::ExecutionError(format!("injected failure: {}", sql)));
        }
        Self::apply(&mut state, sql)
    }

    async fn query(&self, sql: &str) -> DbResult<Vec<Row>> {
        let mut state = self.state();
        state.queries.push(sql.to_string());
        if sql.contains("system.tables") || sql.contains("duckdb_tables()") {
            return Ok(state.relations.clone());
        }
        let table = sql
            .split_whitespace()
            .skip_while(|w| !w.eq_ignore_ascii_case("FROM"))
            .nth(1)
            .map(bare);
        match table {
            Some(t) if state.tables.contains(&t) => {
                Ok(state.rows.get(&t).cloned().unwrap_or_default())
            }
            Some(t) => Err(DbError::ExecutionError(format!(
                "Table {} doesn't exist: {}",
                t, sql
            ))),
            None => Ok(Vec::new()),
        }
    }

    async fn insert_row(&self, table: &str, row: &Row) -> DbResult<()> {
        let mut state = self.state();
        if !state.tables.contains(table) {
            return Err(DbError::ExecutionError(format!(
                "Table {} doesn't exist",
                table
            )));
        }
        state
            .rows
            .entry(table.to_string())
            .or_default()
            .push(row.clone());
        Ok(())
    }

    async fn relation_exists(&self, name: &str) -> DbResult<bool> {
        Ok(self.state().tables.contains(name))
    }

    fn db_type(&self) -> DbType {
        self.db_type
    }
}
