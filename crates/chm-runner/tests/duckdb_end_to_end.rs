//! Full migration lifecycle against an embedded DuckDB database

use chm_core::{Config, DbType, MigrationLoader};
use chm_db::{Database, DuckDbBackend};
use chm_runner::{dump_schema, ApplyEngine, RollbackCommand, RunnerError, LEDGER_TABLE};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const USERS: &str = "20250101000000_users.sql";
const ACTIVE: &str = "20250102000000_active_users.sql";

fn duckdb_config() -> Config {
    Config {
        backend: DbType::DuckDb,
        database: Some(":memory:".to_string()),
        ..Config::default()
    }
}

fn write_migrations(dir: &Path) {
    fs::write(
        dir.join(USERS),
        "-- users table\n\
         CREATE TABLE users (id INTEGER, name VARCHAR, active BOOLEAN);\n\
         INSERT INTO users VALUES (1, 'ann', true), (2, 'bob; the builder', false);\n\
         -- ROLLBACK BELOW --\n\
         DROP TABLE users;\n",
    )
    .unwrap();
    fs::write(
        dir.join(ACTIVE),
        "CREATE VIEW active_users AS SELECT id, name FROM users WHERE active;\n\
         -- ROLLBACK BELOW --\n\
         DROP VIEW active_users;\n",
    )
    .unwrap();
}

async fn ledger_files(db: &DuckDbBackend) -> Vec<String> {
    db.query(&format!(
        "SELECT filename FROM {LEDGER_TABLE} ORDER BY filename"
    ))
    .await
    .unwrap()
    .iter()
    .map(|r| r["filename"].as_str().unwrap().to_string())
    .collect()
}

#[tokio::test]
async fn test_apply_rollback_and_dump() {
    let dir = tempdir().unwrap();
    write_migrations(dir.path());
    let config = duckdb_config();
    let loader = MigrationLoader::new(dir.path(), &config);
    let db = DuckDbBackend::in_memory().unwrap();
    let engine = ApplyEngine::new(&db, &loader, &config);

    let report = engine.apply(false).await.unwrap();
    assert_eq!(report.applied, vec![USERS, ACTIVE]);
    assert!(db.relation_exists("users").await.unwrap());
    assert!(db.relation_exists("active_users").await.unwrap());
    assert_eq!(ledger_files(&db).await, vec![USERS, ACTIVE]);

    let rows = db
        .query("SELECT name FROM users ORDER BY id")
        .await
        .unwrap();
    assert_eq!(rows[1]["name"], "bob; the builder");

    let report = engine.apply(false).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped.len(), 2);

    let schema = dump_schema(&db).await.unwrap();
    assert!(schema.contains("CREATE TABLE IF NOT EXISTS users"));
    assert!(schema.contains("CREATE VIEW IF NOT EXISTS active_users"));
    assert!(!schema.contains(LEDGER_TABLE));

    RollbackCommand::new(&db, &loader, &config)
        .rollback(ACTIVE)
        .await
        .unwrap();
    assert!(!db.relation_exists("active_users").await.unwrap());
    assert_eq!(ledger_files(&db).await, vec![USERS]);

    // The rolled back file is pending again
    let report = engine.apply(true).await.unwrap();
    assert_eq!(report.pending, vec![ACTIVE]);
}

#[tokio::test]
async fn test_failed_run_is_compensated() {
    let dir = tempdir().unwrap();
    write_migrations(dir.path());
    fs::write(
        dir.path().join("20250103000000_broken.sql"),
        "INSERT INTO no_such_table VALUES (1);\n",
    )
    .unwrap();
    let config = duckdb_config();
    let loader = MigrationLoader::new(dir.path(), &config);
    let db = DuckDbBackend::in_memory().unwrap();

    let err = ApplyEngine::new(&db, &loader, &config)
        .apply(false)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Execution { ref filename, .. } if filename == "20250103000000_broken.sql"));
    assert!(err.to_string().contains("no_such_table"));

    assert!(!db.relation_exists("users").await.unwrap());
    assert!(!db.relation_exists("active_users").await.unwrap());
    assert!(ledger_files(&db).await.is_empty());
}

#[tokio::test]
async fn test_edited_migration_is_drift() {
    let dir = tempdir().unwrap();
    write_migrations(dir.path());
    let config = duckdb_config();
    let loader = MigrationLoader::new(dir.path(), &config);
    let db = DuckDbBackend::in_memory().unwrap();
    ApplyEngine::new(&db, &loader, &config)
        .apply(false)
        .await
        .unwrap();

    fs::write(
        dir.path().join(USERS),
        "CREATE TABLE users (id BIGINT);\n",
    )
    .unwrap();
    let err = ApplyEngine::new(&db, &loader, &config)
        .apply(false)
        .await
        .unwrap_err();
    assert!(matches!(err, RunnerError::Drift { ref filename, .. } if filename == USERS));
}
