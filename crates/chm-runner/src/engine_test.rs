use super::*;
use crate::compensation::CompensationOutcome;
use crate::ledger::LEDGER_TABLE;
use chm_db::mock::MockDatabase;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

const T_SQL: &str = "CREATE TABLE t (id UInt8) ENGINE=Memory;\n-- ROLLBACK BELOW --\nDROP TABLE t;";

fn write(dir: &Path, name: &str, text: &str) {
    fs::write(dir.join(name), text).unwrap();
}

fn table_file(table: &str) -> String {
    format!("CREATE TABLE {table} (id UInt8) ENGINE = Memory;\n-- ROLLBACK BELOW --\nDROP TABLE {table};")
}

async fn apply(
    db: &MockDatabase,
    dir: &Path,
    config: &Config,
    dry_run: bool,
) -> RunnerResult<ApplyReport> {
    let loader = MigrationLoader::new(dir, config);
    ApplyEngine::new(db, &loader, config).apply(dry_run).await
}

/// Executed statements other than ledger bookkeeping
fn migration_statements(db: &MockDatabase) -> Vec<String> {
    db.executed()
        .into_iter()
        .filter(|s| !s.contains(LEDGER_TABLE))
        .collect()
}

fn ledger_filenames(db: &MockDatabase) -> Vec<String> {
    db.rows(LEDGER_TABLE)
        .iter()
        .map(|r| r["filename"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_reconcile_splits_pending_and_skipped() {
    let a = MigrationFile::parse("a.sql", "SELECT 1;").unwrap();
    let b = MigrationFile::parse("b.sql", "SELECT 2;").unwrap();
    let files = vec![a.clone(), b];
    let ledger = HashMap::from([("a.sql".to_string(), a.content_hash.clone())]);

    let plan = reconcile(&files, &ledger).unwrap();
    assert_eq!(names(&plan.skipped), vec!["a.sql"]);
    assert_eq!(names(&plan.pending), vec!["b.sql"]);
}

#[test]
fn test_reconcile_ignores_entries_without_file() {
    let files = vec![MigrationFile::parse("a.sql", "SELECT 1;").unwrap()];
    let ledger = HashMap::from([("gone.sql".to_string(), "h".to_string())]);

    let plan = reconcile(&files, &ledger).unwrap();
    assert_eq!(plan.pending.len(), 1);
}

#[test]
fn test_reconcile_drift() {
    let files = vec![MigrationFile::parse("a.sql", "SELECT 1;").unwrap()];
    let ledger = HashMap::from([("a.sql".to_string(), "stale".to_string())]);

    match reconcile(&files, &ledger).unwrap_err() {
        RunnerError::Drift {
            filename, recorded, ..
        } => {
            assert_eq!(filename, "a.sql");
            assert_eq!(recorded, "stale");
        }
        other => panic!("expected drift, got {other}"),
    }
}

#[tokio::test]
async fn test_empty_directory_creates_ledger_only() {
    let dir = tempdir().unwrap();
    let db = MockDatabase::default();

    let report = apply(&db, dir.path(), &Config::default(), false).await.unwrap();
    assert!(report.applied.is_empty());
    assert!(db.has_table(LEDGER_TABLE));
    assert!(migration_statements(&db).is_empty());
}

#[tokio::test]
async fn test_apply_then_reapply_is_noop() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250101000000_t.sql", T_SQL);
    let db = MockDatabase::default();
    let config = Config::default();

    let report = apply(&db, dir.path(), &config, false).await.unwrap();
    assert_eq!(report.applied, vec!["20250101000000_t.sql"]);
    assert_eq!(
        migration_statements(&db),
        vec!["CREATE TABLE t (id UInt8) ENGINE=Memory"]
    );
    assert!(db.has_table("t"));
    assert_eq!(ledger_filenames(&db), vec!["20250101000000_t.sql"]);

    db.clear_log();
    let report = apply(&db, dir.path(), &config, false).await.unwrap();
    assert!(report.applied.is_empty());
    assert_eq!(report.skipped, vec!["20250101000000_t.sql"]);
    assert!(migration_statements(&db).is_empty());
    assert_eq!(db.rows(LEDGER_TABLE).len(), 1);
}

#[tokio::test]
async fn test_ledger_hash_matches_file_contents() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250101000000_t.sql", T_SQL);
    let db = MockDatabase::default();

    apply(&db, dir.path(), &Config::default(), false).await.unwrap();
    let rows = db.rows(LEDGER_TABLE);
    assert_eq!(rows[0]["hash"], chm_core::content_hash(T_SQL));
}

#[tokio::test]
async fn test_applies_in_filename_order() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250103000000_c.sql", &table_file("c"));
    write(dir.path(), "20250101000000_a.sql", &table_file("a"));
    write(dir.path(), "20250102000000_b.sql", &table_file("b"));
    let db = MockDatabase::default();

    let report = apply(&db, dir.path(), &Config::default(), false).await.unwrap();
    assert_eq!(
        report.applied,
        vec![
            "20250101000000_a.sql",
            "20250102000000_b.sql",
            "20250103000000_c.sql"
        ]
    );
    assert_eq!(
        migration_statements(&db),
        vec![
            "CREATE TABLE a (id UInt8) ENGINE = Memory",
            "CREATE TABLE b (id UInt8) ENGINE = Memory",
            "CREATE TABLE c (id UInt8) ENGINE = Memory",
        ]
    );
}

#[tokio::test]
async fn test_only_new_files_run_on_second_apply() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250101000000_a.sql", &table_file("a"));
    let db = MockDatabase::default();
    let config = Config::default();
    apply(&db, dir.path(), &config, false).await.unwrap();

    write(dir.path(), "20250102000000_b.sql", &table_file("b"));
    db.clear_log();
    let report = apply(&db, dir.path(), &config, false).await.unwrap();

    assert_eq!(report.applied, vec!["20250102000000_b.sql"]);
    assert_eq!(
        migration_statements(&db),
        vec!["CREATE TABLE b (id UInt8) ENGINE = Memory"]
    );
}

#[tokio::test]
async fn test_drift_aborts_before_any_execution() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250101000000_a.sql", &table_file("a"));
    let db = MockDatabase::default();
    let config = Config::default();
    apply(&db, dir.path(), &config, false).await.unwrap();

    // Edited after it was applied, plus a new file that would be pending
    write(
        dir.path(),
        "20250101000000_a.sql",
        "CREATE TABLE a (id UInt16) ENGINE = Memory;",
    );
    write(dir.path(), "20250102000000_b.sql", &table_file("b"));
    db.clear_log();

    let err = apply(&db, dir.path(), &config, false).await.unwrap_err();
    assert!(matches!(err, RunnerError::Drift { ref filename, .. } if filename == "20250101000000_a.sql"));
    assert!(err.to_string().contains("Hash mismatch"));
    assert!(migration_statements(&db).is_empty());
    assert!(!db.has_table("b"));
}

#[tokio::test]
async fn test_failure_compensates_in_reverse_order() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250101000000_a.sql", &table_file("a"));
    write(dir.path(), "20250102000000_b.sql", &table_file("b"));
    write(
        dir.path(),
        "20250103000000_c.sql",
        "CREATE TABLE c (id UInt8) ENGINE = Memory;\nINSERT INTO boom VALUES (1);\n-- ROLLBACK BELOW --\nDROP TABLE IF EXISTS c;",
    );
    let db = MockDatabase::default().fail_on("boom");

    let err = apply(&db, dir.path(), &Config::default(), false)
        .await
        .unwrap_err();

    match &err {
        RunnerError::Execution {
            filename,
            at,
            source,
            ..
        } => {
            assert_eq!(filename, "20250103000000_c.sql");
            assert_eq!(*at, FailurePoint::Statement(2));
            assert!(source.to_string().contains("boom"));
        }
        other => panic!("expected execution error, got {other}"),
    }
    assert!(err.to_string().contains("injected failure"));

    assert_eq!(
        migration_statements(&db),
        vec![
            "CREATE TABLE a (id UInt8) ENGINE = Memory",
            "CREATE TABLE b (id UInt8) ENGINE = Memory",
            "CREATE TABLE c (id UInt8) ENGINE = Memory",
            "INSERT INTO boom VALUES (1)",
            "DROP TABLE IF EXISTS c",
            "DROP TABLE b",
            "DROP TABLE a",
        ]
    );

    let compensations = err.compensations();
    let order: Vec<&str> = compensations.iter().map(|c| c.filename.as_str()).collect();
    assert_eq!(
        order,
        vec![
            "20250103000000_c.sql",
            "20250102000000_b.sql",
            "20250101000000_a.sql"
        ]
    );
    assert!(compensations
        .iter()
        .all(|c| c.outcome == CompensationOutcome::Succeeded));

    assert!(ledger_filenames(&db).is_empty());
    assert!(!db.has_table("a"));
    assert!(!db.has_table("b"));
    assert!(!db.has_table("c"));
}

#[tokio::test]
async fn test_failed_or_missing_compensation_keeps_ledger_entry() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "20250101000000_a.sql",
        "CREATE TABLE a (id UInt8) ENGINE = Memory;\n-- ROLLBACK BELOW --\nDROP TABLE a_typo;",
    );
    write(
        dir.path(),
        "20250102000000_b.sql",
        "CREATE TABLE b (id UInt8) ENGINE = Memory;",
    );
    write(dir.path(), "20250103000000_c.sql", "INSERT INTO boom VALUES (1);");
    let db = MockDatabase::default().fail_on("boom");

    let err = apply(&db, dir.path(), &Config::default(), false)
        .await
        .unwrap_err();

    let compensations = err.compensations();
    assert_eq!(compensations.len(), 3);
    assert_eq!(compensations[0].outcome, CompensationOutcome::NothingToUndo);
    assert_eq!(compensations[1].outcome, CompensationOutcome::NothingToUndo);
    assert!(matches!(
        compensations[2].outcome,
        CompensationOutcome::Failed { .. }
    ));
    assert!(compensations.iter().all(|c| !c.ledger_entry_removed));

    assert_eq!(
        ledger_filenames(&db),
        vec!["20250101000000_a.sql", "20250102000000_b.sql"]
    );
}

#[tokio::test]
async fn test_ledger_write_failure_compensates_file() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "20250101000000_drop_ledger.sql",
        "DROP TABLE migrations;\n-- ROLLBACK BELOW --\nSELECT 'undo';",
    );
    let db = MockDatabase::default();

    let err = apply(&db, dir.path(), &Config::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Execution {
            at: FailurePoint::LedgerWrite,
            ..
        }
    ));
    assert_eq!(db.executed().last().unwrap(), "SELECT 'undo'");
}

#[tokio::test]
async fn test_dry_run_reports_and_changes_nothing() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250101000000_a.sql", &table_file("a"));
    let db = MockDatabase::default();

    let report = apply(&db, dir.path(), &Config::default(), true).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.pending, vec!["20250101000000_a.sql"]);
    assert!(report.applied.is_empty());
    assert!(db.executed().is_empty());
    assert!(!db.has_table(LEDGER_TABLE));
}

#[tokio::test]
async fn test_dry_run_with_existing_ledger() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250101000000_a.sql", &table_file("a"));
    let db = MockDatabase::default();
    let config = Config::default();
    apply(&db, dir.path(), &config, false).await.unwrap();

    write(dir.path(), "20250102000000_b.sql", &table_file("b"));
    db.clear_log();
    let report = apply(&db, dir.path(), &config, true).await.unwrap();

    assert_eq!(report.skipped, vec!["20250101000000_a.sql"]);
    assert_eq!(report.pending, vec!["20250102000000_b.sql"]);
    assert!(db.executed().is_empty());
    assert_eq!(db.rows(LEDGER_TABLE).len(), 1);
}

#[tokio::test]
async fn test_cluster_violation_executes_nothing() {
    let dir = tempdir().unwrap();
    write(dir.path(), "20250101000000_a.sql", &table_file("a"));
    let db = MockDatabase::default();
    let config = Config {
        cluster: Some("prod".to_string()),
        ..Config::default()
    };

    let err = apply(&db, dir.path(), &config, false).await.unwrap_err();
    match err {
        RunnerError::Validation(violation) => {
            assert_eq!(violation.filename, "20250101000000_a.sql");
        }
        other => panic!("expected validation error, got {other}"),
    }
    assert!(db.executed().is_empty());
}

#[tokio::test]
async fn test_cluster_mode_substitutes_and_applies() {
    let dir = tempdir().unwrap();
    write(
        dir.path(),
        "20250101000000_events.sql",
        "CREATE TABLE events ON CLUSTER ${CH_CLUSTER} (id UInt64) \
         ENGINE = ReplicatedMergeTree ORDER BY id;\n\
         -- ROLLBACK BELOW --\n\
         DROP TABLE events ON CLUSTER ${CH_CLUSTER};",
    );
    let db = MockDatabase::default();
    let config = Config {
        cluster: Some("prod".to_string()),
        ..Config::default()
    };

    let report = apply(&db, dir.path(), &config, false).await.unwrap();
    assert_eq!(report.applied.len(), 1);
    assert!(db.executed()[0].contains("migrations ON CLUSTER prod"));
    assert_eq!(
        migration_statements(&db),
        vec!["CREATE TABLE events ON CLUSTER prod (id UInt64) ENGINE = ReplicatedMergeTree ORDER BY id"]
    );
}

#[tokio::test]
async fn test_missing_directory_is_config_error() {
    let dir = tempdir().unwrap();
    let db = MockDatabase::default();

    let err = apply(&db, &dir.path().join("nope"), &Config::default(), false)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        RunnerError::Core(chm_core::CoreError::MigrationsDirNotFound { .. })
    ));
    assert!(db.executed().is_empty());
}
