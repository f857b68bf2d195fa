use super::*;
use crate::journal::Journal;
use crate::schema::{LEDGER_DDL, LOG_DDL};
use crate::snapshot::{SnapshotGenerator, SnapshotLimits};
use dbv_db::DuckDbBackend;
use dbv_sql::KeywordScanner;

const V1: Version = Version::new(1);

fn setup() -> DuckDbBackend {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch(LEDGER_DDL).unwrap();
    db.execute_batch(LOG_DDL).unwrap();
    db
}

fn generator() -> SnapshotGenerator {
    SnapshotGenerator::new(SnapshotLimits {
        split_bytes: 250_000,
        row_overhead_bytes: 64,
        max_packet_bytes: 16 << 20,
    })
}

fn script(db: &DuckDbBackend, name: &str, sql: &str) -> ChangeScript {
    ChangeScript::new(V1, name, sql, db, &KeywordScanner::default()).unwrap()
}

#[test]
fn test_new_collects_tables_and_fingerprint() {
    let db = setup();
    let sql = "CREATE TABLE users (id INTEGER); INSERT INTO users SELECT id FROM staging;";
    let s = script(&db, "dbc1_users.sql", sql);

    assert_eq!(s.version(), V1);
    assert_eq!(s.name(), "dbc1_users.sql");
    assert_eq!(s.content(), sql);
    assert_eq!(s.fingerprint(), compute_checksum(sql));
    let tables: Vec<&str> = s.affected_tables().iter().map(String::as_str).collect();
    assert_eq!(tables, vec!["staging", "users"]);
}

#[test]
fn test_new_rejects_invalid_sql() {
    let db = setup();
    let err = ChangeScript::new(
        V1,
        "dbc1_bad.sql",
        "CREATE TABLE (",
        &db,
        &KeywordScanner::default(),
    )
    .unwrap_err();
    assert!(matches!(err, EngineError::Script { ref name, .. } if name == "dbc1_bad.sql"));
    assert!(err.to_string().contains("[G001]"));
}

#[test]
fn test_new_accepts_duckdb_only_syntax() {
    let db = setup();
    let s = script(
        &db,
        "dbc1_by_name.sql",
        "CREATE TABLE t_by (id INTEGER); INSERT INTO t_by BY NAME SELECT 1 AS id;",
    );
    assert!(s.affected_tables().contains("t_by"));
    assert!(db.describe_table("t_by").unwrap().is_none());
}

#[test]
fn test_new_rejects_script_without_tables() {
    let db = setup();
    let err = ChangeScript::new(
        V1,
        "dbc1_noop.sql",
        "SELECT 1",
        &db,
        &KeywordScanner::default(),
    )
    .unwrap_err();
    assert!(err.to_string().contains("no tables detected"));
}

#[test]
fn test_new_accepts_tables_that_do_not_exist_yet() {
    let db = setup();
    let s = script(&db, "dbc1_a.sql", "INSERT INTO later (x) VALUES (1)");
    assert!(s.affected_tables().contains("later"));
}

#[test]
fn test_run_once_then_skip() {
    let db = setup();
    let journal = Journal::quiet(&db);
    let ctx = RunContext::new(&db, &journal, generator());
    let s = script(&db, "dbc1_t.sql", "CREATE TABLE t (x INTEGER)");

    assert!(!s.is_applied(&ctx).unwrap());
    let first = s.run(&ctx);
    assert_eq!(first.status, ScriptStatus::Ok);
    assert!(s.is_applied(&ctx).unwrap());

    let second = s.run(&ctx);
    assert_eq!(second.status, ScriptStatus::Skipped);
    assert!(second.succeeded());

    let statuses: Vec<ScriptStatus> = journal
        .entries(V1)
        .into_iter()
        .map(|(_, status, _)| status)
        .collect();
    assert_eq!(statuses, vec![ScriptStatus::Ok, ScriptStatus::Skipped]);
}

#[test]
fn test_changed_content_runs_again() {
    let db = setup();
    let journal = Journal::quiet(&db);
    let ctx = RunContext::new(&db, &journal, generator());
    db.execute_batch("CREATE TABLE t (x INTEGER)").unwrap();

    let v1 = script(&db, "dbc1_t.sql", "INSERT INTO t VALUES (1)");
    let v2 = script(&db, "dbc1_t.sql", "INSERT INTO t VALUES (2)");
    assert!(v1.execute(&ctx));
    assert!(v2.execute(&ctx));
    assert!(v1.execute(&ctx));

    let rows = db.query("SELECT x FROM t ORDER BY x", &[]).unwrap();
    assert_eq!(
        rows,
        vec![vec![Some("1".to_string())], vec![Some("2".to_string())]]
    );
}

#[test]
fn test_failure_is_reported_not_recorded() {
    let db = setup();
    let journal = Journal::quiet(&db);
    let ctx = RunContext::new(&db, &journal, generator());
    let s = script(&db, "dbc2_bad.sql", "INSERT INTO missing VALUES (1)");

    let outcome = s.run(&ctx);
    assert_eq!(outcome.status, ScriptStatus::Failed);
    assert!(!outcome.message.is_empty());
    assert!(!s.execute(&ctx));
    assert!(!s.is_applied(&ctx).unwrap());

    let entries = journal.entries(V1);
    assert_eq!(entries[0].0, "dbc2_bad.sql");
    assert_eq!(entries[0].1, ScriptStatus::Failed);
}

#[test]
fn test_run_without_ledger_table() {
    let db = DuckDbBackend::in_memory().unwrap();
    let journal = Journal::quiet(&db);
    let ctx = RunContext::new(&db, &journal, generator());
    let s = ChangeScript::new(
        Version::ZERO,
        "dbc1_dbv_queries.sql",
        LEDGER_DDL,
        &db,
        &KeywordScanner::default(),
    )
    .unwrap();

    assert!(s.execute(&ctx));
    assert!(s.is_applied(&ctx).unwrap());
}
