//! End-to-end deployment scenarios against an in-memory DuckDB.
//!
//! Each test lays out a changes directory on disk, drives a [`Deployer`]
//! through it and checks the resulting tables, ledger and version state.

use dbv_core::{ChangeLayout, DeployMode, Version};
use dbv_db::{Backend, DuckDbBackend};
use dbv_engine::{
    write_bootstrap_scripts, DeployOptions, DeployOutcome, DeployReport, Deployer, Direction,
    Journal, Ledger, LedgerSummary, ScriptStatus, StateStore, StoredState, BACKUP_PREFIX,
};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

// ── Helpers ────────────────────────────────────────────────────────────

fn v(n: u32) -> Version {
    Version::new(n)
}

/// Changes directory with the bootstrap v0 plus `files` (`"v1/dbc1_x.sql"`)
fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = TempDir::new().unwrap();
    write_bootstrap_scripts(&dir.path().join("v0")).unwrap();
    for (rel, sql) in files {
        write(dir.path(), rel, sql);
    }
    dir
}

fn write(root: &Path, rel: &str, sql: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, sql).unwrap();
}

fn deployer<'a>(db: &'a DuckDbBackend, dir: &TempDir) -> Deployer<'a> {
    Deployer::new(db, ChangeLayout::new(dir.path()), Journal::quiet(db)).unwrap()
}

fn deploy_to(db: &DuckDbBackend, dir: &TempDir, target: u32) -> DeployReport {
    deployer(db, dir)
        .deploy(Some(v(target)), DeployMode::Integrity)
        .unwrap()
}

fn state(db: &DuckDbBackend) -> StoredState {
    StateStore::new(db).read().unwrap()
}

fn count(db: &DuckDbBackend, table: &str) -> i64 {
    let rows = db
        .query(&format!("SELECT count(*) FROM {table}"), &[])
        .unwrap();
    rows[0][0].as_deref().unwrap().parse().unwrap()
}

fn exists(db: &DuckDbBackend, table: &str) -> bool {
    db.describe_table(table).unwrap().is_some()
}

fn two_table_project() -> TempDir {
    project(&[
        (
            "v1/dbc1_customers.sql",
            "CREATE TABLE customers (id INTEGER, name VARCHAR)",
        ),
        (
            "v1/dbc2_seed_customers.sql",
            "INSERT INTO customers VALUES (1, 'ada'), (2, 'grace')",
        ),
        (
            "v2/dbc1_orders.sql",
            "CREATE TABLE orders (id INTEGER, customer_id INTEGER)",
        ),
        ("v2/dbc2_seed_orders.sql", "INSERT INTO orders VALUES (10, 1)"),
    ])
}

// ── Scenarios ──────────────────────────────────────────────────────────

/// Fresh database deployed to v2: bootstrap, two versions, backups for 1 and 2
#[test]
fn test_fresh_database_to_v2() {
    let dir = two_table_project();
    let db = DuckDbBackend::in_memory().unwrap();

    let report = deploy_to(&db, &dir, 2);
    assert_eq!(report.outcome, DeployOutcome::Deployed);
    assert_eq!(report.direction, Direction::Forward);
    assert_eq!(report.from, Some(Version::ZERO));

    assert_eq!(
        state(&db),
        StoredState {
            current_version: v(2),
            highest_version: v(2)
        }
    );
    assert_eq!(count(&db, "customers"), 2);
    assert_eq!(count(&db, "orders"), 1);

    let summary = Ledger::new(&db).summary().unwrap();
    let per_version: Vec<(u32, u64, bool)> = summary
        .iter()
        .map(|s| (s.version.number(), s.scripts, s.backups > 0))
        .collect();
    assert_eq!(per_version, vec![(0, 3, false), (1, 2, true), (2, 2, true)]);
}

/// v3 back to v1 rolls back 3 then 2 and keeps the high-water mark
#[test]
fn test_backward_from_v3_to_v1() {
    let dir = project(&[
        ("v1/dbc1_a.sql", "CREATE TABLE a (id INTEGER)"),
        (
            "v2/dbc1_b.sql",
            "CREATE TABLE b (id INTEGER); INSERT INTO b VALUES (1), (2);",
        ),
        ("v3/dbc1_a_label.sql", "ALTER TABLE a ADD COLUMN label VARCHAR"),
        ("v3/dbc2_b_more.sql", "INSERT INTO b VALUES (3)"),
    ]);
    let db = DuckDbBackend::in_memory().unwrap();
    assert!(deploy_to(&db, &dir, 3).is_success());
    assert_eq!(count(&db, "b"), 3);

    let report = deploy_to(&db, &dir, 1);
    assert_eq!(report.direction, Direction::Backward);
    assert_eq!(report.outcome, DeployOutcome::Deployed);

    assert_eq!(
        state(&db),
        StoredState {
            current_version: v(1),
            highest_version: v(3)
        }
    );
    assert!(!exists(&db, "b"));
    assert_eq!(db.describe_table("a").unwrap().unwrap().columns, vec!["id"]);

    let ledger = Ledger::new(&db);
    assert!(ledger.records(v(2)).unwrap().is_empty());
    assert!(ledger.records(v(3)).unwrap().is_empty());
    assert_eq!(ledger.records(v(1)).unwrap().len(), 2);
}

/// Rollback of one version replays each table's DROP, CREATE, then data
#[test]
fn test_rollback_replays_newest_first() {
    let dir = project(&[
        ("v1/dbc1_b.sql", "CREATE TABLE b (id INTEGER); INSERT INTO b VALUES (1);"),
        ("v2/dbc1_b_more.sql", "INSERT INTO b VALUES (2)"),
    ]);
    let db = DuckDbBackend::in_memory().unwrap();
    deploy_to(&db, &dir, 2);
    deploy_to(&db, &dir, 1);

    let replayed: Vec<String> = Journal::quiet(&db)
        .entries(v(2))
        .into_iter()
        .filter(|(name, _, _)| name.starts_with(BACKUP_PREFIX))
        .map(|(name, status, _)| {
            assert_eq!(status, ScriptStatus::Ok);
            name.splitn(3, '_').take(2).collect::<Vec<_>>().join("_")
        })
        .collect();
    assert_eq!(replayed, vec!["backup_1", "backup_2", "backup_3"]);

    let rows = db.query("SELECT id FROM b ORDER BY id", &[]).unwrap();
    assert_eq!(rows, vec![vec![Some("1".to_string())]]);
}

/// Rolling back a data-only version keeps the indexes of earlier versions
#[test]
fn test_rollback_rebuilds_indexes() {
    let dir = project(&[
        (
            "v1/dbc1_c.sql",
            "CREATE TABLE c (id INTEGER, name VARCHAR, code VARCHAR);
             CREATE INDEX c_name_idx ON c (name);
             CREATE UNIQUE INDEX c_code_idx ON c (code);",
        ),
        ("v2/dbc1_seed_c.sql", "INSERT INTO c VALUES (1, 'ada', 'A1')"),
    ]);
    let db = DuckDbBackend::in_memory().unwrap();
    let indexes = |db: &DuckDbBackend| {
        db.query(
            "SELECT index_name FROM duckdb_indexes() WHERE table_name = 'c' ORDER BY index_name",
            &[],
        )
        .unwrap()
    };

    assert!(deploy_to(&db, &dir, 1).is_success());
    let before = indexes(&db);
    assert_eq!(before.len(), 2);

    assert!(deploy_to(&db, &dir, 2).is_success());
    assert!(deploy_to(&db, &dir, 1).is_success());

    assert_eq!(indexes(&db), before);
    assert_eq!(count(&db, "c"), 0);
    db.execute_batch("INSERT INTO c VALUES (2, 'bob', 'B1')").unwrap();
    assert!(db
        .execute_batch("INSERT INTO c VALUES (3, 'cy', 'B1')")
        .is_err());
}

/// A script DuckDB accepts but the generic SQL parser does not still deploys
#[test]
fn test_duckdb_only_syntax_deploys() {
    let dir = project(&[(
        "v1/dbc1_by_name.sql",
        "CREATE TABLE t_by (id INTEGER, label VARCHAR);
         INSERT INTO t_by BY NAME SELECT 'x' AS label, 1 AS id;",
    )]);
    let db = DuckDbBackend::in_memory().unwrap();

    assert!(deploy_to(&db, &dir, 1).is_success());
    let rows = db.query("SELECT id, label FROM t_by", &[]).unwrap();
    assert_eq!(
        rows,
        vec![vec![Some("1".to_string()), Some("x".to_string())]]
    );
}

/// A failing script in v2 rolls v2 back; nothing of the run is persisted
#[test]
fn test_failure_in_v2_leaves_state_unpersisted() {
    let dir = project(&[
        ("v1/dbc1_a.sql", "CREATE TABLE a (id INTEGER)"),
        ("v2/dbc1_b.sql", "CREATE TABLE b (id INTEGER)"),
        ("v2/dbc2_broken.sql", "INSERT INTO no_such_table VALUES (1)"),
    ]);
    let db = DuckDbBackend::in_memory().unwrap();

    let report = deploy_to(&db, &dir, 2);
    assert!(!report.is_success());
    assert!(matches!(
        report.outcome,
        DeployOutcome::Failed { version: Some(failed), .. } if failed == v(2)
    ));

    // v1 ran, but state is only written once the whole traversal succeeds
    let stored = state(&db);
    assert_eq!(stored.current_version, Version::ZERO);
    assert!(exists(&db, "a"));
    assert!(!exists(&db, "b"));
    assert!(Ledger::new(&db).records(v(2)).unwrap().is_empty());
}

/// Deploying to v1 first, then failing in v2, leaves the state at v1
#[test]
fn test_failure_after_persisted_v1() {
    let dir = project(&[
        ("v1/dbc1_a.sql", "CREATE TABLE a (id INTEGER)"),
        ("v2/dbc1_b.sql", "CREATE TABLE b (id INTEGER)"),
        ("v2/dbc2_broken.sql", "INSERT INTO no_such_table VALUES (1)"),
    ]);
    let db = DuckDbBackend::in_memory().unwrap();
    assert!(deploy_to(&db, &dir, 1).is_success());

    let report = deploy_to(&db, &dir, 2);
    assert!(!report.is_success());
    assert_eq!(state(&db).current_version, v(1));
    assert!(!exists(&db, "b"));
}

// ── Idempotency and fingerprints ───────────────────────────────────────

/// Re-deploying the current version skips everything already applied
#[test]
fn test_redeploy_same_version_is_idempotent() {
    let dir = two_table_project();
    let db = DuckDbBackend::in_memory().unwrap();
    deploy_to(&db, &dir, 2);
    let before = Ledger::new(&db).summary().unwrap();

    let report = deploy_to(&db, &dir, 2);
    assert_eq!(report.direction, Direction::Same);
    assert!(report.is_success());
    assert_eq!(count(&db, "customers"), 2);
    assert_eq!(count(&db, "orders"), 1);

    let after = Ledger::new(&db).summary().unwrap();
    let scripts = |s: &[LedgerSummary]| -> Vec<u64> {
        s.iter().map(|x| x.scripts).collect()
    };
    assert_eq!(scripts(&before), scripts(&after));
}

/// Editing a script of the current version re-executes it
#[test]
fn test_changed_script_runs_again() {
    let dir = two_table_project();
    let db = DuckDbBackend::in_memory().unwrap();
    deploy_to(&db, &dir, 2);

    write(
        dir.path(),
        "v2/dbc2_seed_orders.sql",
        "INSERT INTO orders VALUES (11, 2)",
    );
    assert!(deploy_to(&db, &dir, 2).is_success());
    assert_eq!(count(&db, "orders"), 2);
}

/// New scripts added to the current version are caught up
#[test]
fn test_new_script_in_current_version() {
    let dir = two_table_project();
    let db = DuckDbBackend::in_memory().unwrap();
    deploy_to(&db, &dir, 2);

    write(
        dir.path(),
        "v2/dbc3_more_orders.sql",
        "INSERT INTO orders VALUES (12, 2)",
    );
    assert!(deploy_to(&db, &dir, 2).is_success());
    assert_eq!(count(&db, "orders"), 2);
    let scripts = Ledger::new(&db)
        .records(v(2))
        .unwrap()
        .into_iter()
        .filter(|r| !r.is_backup())
        .count();
    assert_eq!(scripts, 3);
}

/// Forward again after a rollback re-applies the retired scripts
#[test]
fn test_forward_after_rollback() {
    let dir = two_table_project();
    let db = DuckDbBackend::in_memory().unwrap();
    deploy_to(&db, &dir, 2);
    deploy_to(&db, &dir, 0);
    assert!(!exists(&db, "customers"));
    assert_eq!(state(&db).highest_version, v(2));

    assert!(deploy_to(&db, &dir, 2).is_success());
    assert_eq!(count(&db, "customers"), 2);
    assert_eq!(count(&db, "orders"), 1);
}

// ── Backups ────────────────────────────────────────────────────────────

/// Existing tables touched by a version are backed up before it mutates them
#[test]
fn test_existing_table_backed_up_before_mutation() {
    let dir = two_table_project();
    write(
        dir.path(),
        "v3/dbc1_rename.sql",
        "UPDATE customers SET name = upper(name)",
    );
    let db = DuckDbBackend::in_memory().unwrap();
    deploy_to(&db, &dir, 3);

    let backups = Ledger::new(&db).list_backups(v(3)).unwrap();
    let customers: Vec<&str> = backups
        .iter()
        .filter(|r| r.name.contains("_customers_"))
        .map(|r| r.content.as_str())
        .collect();
    assert!(customers[0].starts_with("DROP TABLE IF EXISTS"));
    assert!(customers[1].to_uppercase().starts_with("CREATE TABLE"));
    assert!(customers[2].contains("'ada'"));

    deploy_to(&db, &dir, 2);
    let rows = db
        .query("SELECT name FROM customers ORDER BY id", &[])
        .unwrap();
    assert_eq!(
        rows,
        vec![vec![Some("ada".to_string())], vec![Some("grace".to_string())]]
    );
}

/// Gap versions with no directory deploy as empty units
#[test]
fn test_gap_version_is_empty() {
    let dir = project(&[
        ("v1/dbc1_a.sql", "CREATE TABLE a (id INTEGER)"),
        ("v3/dbc1_b.sql", "CREATE TABLE b (id INTEGER)"),
    ]);
    let db = DuckDbBackend::in_memory().unwrap();

    assert!(deploy_to(&db, &dir, 3).is_success());
    assert!(exists(&db, "b"));
    assert_eq!(state(&db).current_version, v(3));
}

// ── Hooks ──────────────────────────────────────────────────────────────

/// Prescript runs before and postscript after a successful traversal
#[test]
fn test_pre_and_post_scripts() {
    let dir = two_table_project();
    let hooks = TempDir::new().unwrap();
    write(
        hooks.path(),
        "pre.sql",
        "CREATE TABLE IF NOT EXISTS audit (event VARCHAR); INSERT INTO audit VALUES ('pre');",
    );
    write(hooks.path(), "post.sql", "INSERT INTO audit VALUES ('post');");
    let db = DuckDbBackend::in_memory().unwrap();
    let options = DeployOptions {
        prescript: Some(hooks.path().join("pre.sql")),
        postscript: Some(hooks.path().join("post.sql")),
        ..DeployOptions::default()
    };

    let report = deployer(&db, &dir)
        .with_options(options)
        .deploy(None, DeployMode::Integrity)
        .unwrap();
    assert!(report.is_success());

    let rows = db.query("SELECT event FROM audit ORDER BY event DESC", &[]).unwrap();
    assert_eq!(
        rows,
        vec![vec![Some("pre".to_string())], vec![Some("post".to_string())]]
    );
}

/// A failing postscript fails the deployment and leaves state unpersisted
#[test]
fn test_failing_postscript() {
    let dir = two_table_project();
    let hooks = TempDir::new().unwrap();
    write(hooks.path(), "post.sql", "INSERT INTO audit VALUES ('post');");
    let db = DuckDbBackend::in_memory().unwrap();
    let options = DeployOptions {
        postscript: Some(hooks.path().join("post.sql")),
        ..DeployOptions::default()
    };

    let report = deployer(&db, &dir)
        .with_options(options)
        .deploy(Some(v(1)), DeployMode::Integrity)
        .unwrap();
    assert!(matches!(
        report.outcome,
        DeployOutcome::Failed { version: None, .. }
    ));
    assert_eq!(state(&db).current_version, Version::ZERO);
}

// ── Persistence ────────────────────────────────────────────────────────

/// State survives reopening a file-backed database
#[test]
fn test_state_survives_reopen() {
    let dir = two_table_project();
    let db_dir = TempDir::new().unwrap();
    let db_path = db_dir.path().join("dbv.duckdb");

    {
        let db = DuckDbBackend::from_path(&db_path).unwrap();
        assert!(deploy_to(&db, &dir, 2).is_success());
    }

    let db = DuckDbBackend::from_path(&db_path).unwrap();
    let status = deployer(&db, &dir).status().unwrap();
    assert!(status.initialized);
    assert_eq!(status.current_version, Some(v(2)));
    assert_eq!(count(&db, "orders"), 1);
}
