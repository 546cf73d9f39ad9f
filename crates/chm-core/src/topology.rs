//! Cluster topology rules for migration scripts.
//!
//! In cluster mode every `CREATE TABLE` must be created on the active
//! cluster with a replicated engine; a table created on one node only, or
//! with a local engine, silently diverges between replicas.

use crate::migration::MigrationFile;
use crate::splitter::mask_literals;
use regex::Regex;
use std::fmt;
use std::sync::OnceLock;

static CREATE_TABLE_RE: OnceLock<Regex> = OnceLock::new();
static REPLICATED_ENGINE_RE: OnceLock<Regex> = OnceLock::new();
static ON_CLUSTER_RE: OnceLock<Regex> = OnceLock::new();
static ON_CLUSTER_TAIL_RE: OnceLock<Regex> = OnceLock::new();

fn create_table_regex() -> &'static Regex {
    CREATE_TABLE_RE.get_or_init(|| {
        Regex::new(r"(?i)^\s*CREATE\s+(?:OR\s+REPLACE\s+)?TABLE\b").expect("valid regex")
    })
}

fn replicated_engine_regex() -> &'static Regex {
    REPLICATED_ENGINE_RE
        .get_or_init(|| Regex::new(r"(?i)\bENGINE\s*(?:=\s*)?Replicated\w*").expect("valid regex"))
}

/// `ON CLUSTER <name>`, with the name bare or in any quote style
fn on_cluster_regex() -> &'static Regex {
    ON_CLUSTER_RE.get_or_init(|| {
        Regex::new(r#"(?i)\bON\s+CLUSTER\s+(?:`([^`]*)`|'([^']*)'|"([^"]*)"|([^\s(`'"]+))"#)
            .expect("valid regex")
    })
}

/// Text ending in `ON CLUSTER`, where a quoted cluster name may follow
fn on_cluster_tail_regex() -> &'static Regex {
    ON_CLUSTER_TAIL_RE
        .get_or_init(|| Regex::new(r"(?i)\bON\s+CLUSTER\s*$").expect("valid regex"))
}

/// What a `CREATE TABLE` statement is missing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// No `ON CLUSTER <active cluster>` clause
    MissingOnCluster,
    /// Engine is not one of the `Replicated*` family
    NonReplicatedEngine,
}

/// First offending statement found by [`check_cluster_topology`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopologyViolation {
    pub filename: String,
    pub statement: String,
    pub cluster: String,
    pub kind: ViolationKind,
}

impl fmt::Display for TopologyViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            ViolationKind::MissingOnCluster => write!(
                f,
                "{}: CREATE TABLE must include ON CLUSTER {}",
                self.filename, self.cluster
            ),
            ViolationKind::NonReplicatedEngine => write!(
                f,
                "{}: CREATE TABLE must use a Replicated* engine in cluster mode",
                self.filename
            ),
        }
    }
}

/// Check one statement; `None` when it is not a `CREATE TABLE` or is fine.
///
/// Comments and string literals never satisfy a rule: only a quoted name
/// directly after `ON CLUSTER` survives masking.
pub fn check_statement(statement: &str, cluster: &str) -> Option<ViolationKind> {
    let code = mask_literals(statement, |before| on_cluster_tail_regex().is_match(before));
    if !create_table_regex().is_match(&code) {
        return None;
    }
    let names_cluster = on_cluster_regex().captures_iter(&code).any(|caps| {
        caps.iter()
            .skip(1)
            .flatten()
            .any(|name| name.as_str() == cluster)
    });
    if !names_cluster {
        return Some(ViolationKind::MissingOnCluster);
    }
    if !replicated_engine_regex().is_match(&code) {
        return Some(ViolationKind::NonReplicatedEngine);
    }
    None
}

/// Validate every up-statement of every file against `cluster`.
///
/// Runs before anything is executed and does not look at the ledger, so
/// already-applied files are checked too.
pub fn check_cluster_topology(
    files: &[MigrationFile],
    cluster: &str,
) -> Result<(), TopologyViolation> {
    for file in files {
        for statement in &file.up_statements {
            if let Some(kind) = check_statement(statement, cluster) {
                return Err(TopologyViolation {
                    filename: file.filename.clone(),
                    statement: statement.clone(),
                    cluster: cluster.to_string(),
                    kind,
                });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "topology_test.rs"]
mod tests;
