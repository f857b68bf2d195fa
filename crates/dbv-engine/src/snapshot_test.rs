use super::*;
use crate::journal::Journal;
use crate::ledger::LedgerRecord;
use crate::schema::{LEDGER_DDL, LOG_DDL};
use dbv_db::{DuckDbBackend, Row};

const V1: Version = Version::new(1);

fn setup() -> DuckDbBackend {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch(LEDGER_DDL).unwrap();
    db.execute_batch(LOG_DDL).unwrap();
    db
}

fn limits(split_bytes: usize, max_packet_bytes: usize) -> SnapshotLimits {
    SnapshotLimits {
        split_bytes,
        row_overhead_bytes: 64,
        max_packet_bytes,
    }
}

fn run_backup(
    db: &DuckDbBackend,
    limits: SnapshotLimits,
    tables: &[&str],
) -> EngineResult<Vec<TableSnapshot>> {
    let journal = Journal::quiet(db);
    let ctx = RunContext::new(db, &journal, SnapshotGenerator::new(limits));
    let set: BTreeSet<String> = tables.iter().map(|t| t.to_string()).collect();
    ctx.snapshots.backup_tables(&ctx, V1, &set)
}

fn backups(db: &DuckDbBackend) -> Vec<LedgerRecord> {
    crate::ledger::Ledger::new(db).list_backups(V1).unwrap()
}

fn replay(db: &DuckDbBackend) {
    for record in backups(db) {
        db.execute_batch(&record.content).unwrap();
    }
}

fn slot_prefix(record: &LedgerRecord) -> String {
    record.name.splitn(3, '_').take(2).collect::<Vec<_>>().join("_")
}

fn items(db: &DuckDbBackend) -> Vec<Row> {
    db.query("SELECT id, label FROM items ORDER BY id", &[])
        .unwrap()
}

#[test]
fn test_small_table_single_chunk() {
    let db = setup();
    db.execute_batch(
        "CREATE TABLE users (id INTEGER, name VARCHAR); INSERT INTO users VALUES (1, 'ada'), (2, 'bob'), (3, 'cy');",
    )
    .unwrap();

    let snaps = run_backup(&db, limits(250_000, 16 << 20), &["users"]).unwrap();
    assert_eq!(
        snaps,
        vec![TableSnapshot {
            table: "users".to_string(),
            existed: true,
            rows: 3,
            chunks: 1,
            indexes: 0,
        }]
    );

    let records = backups(&db);
    let slots: Vec<String> = records.iter().map(slot_prefix).collect();
    assert_eq!(slots, vec!["backup_1", "backup_2", "backup_3"]);
    assert!(records[0].content.starts_with("DROP TABLE IF EXISTS"));
    assert!(records[1].content.to_uppercase().starts_with("CREATE TABLE"));
    assert!(records[2].content.starts_with("INSERT INTO \"users\""));
    assert!(records.iter().all(|r| r.name.contains("_users_")));
}

#[test]
fn test_replay_order_is_drop_create_then_chunks_newest_first() {
    let db = setup();
    db.execute_batch(
        "CREATE TABLE pairs (id INTEGER, v VARCHAR); INSERT INTO pairs VALUES (1, 'a'), (2, 'b');",
    )
    .unwrap();

    // A split threshold of one byte flushes after every row: I1, I2, C, D
    let snaps = run_backup(&db, limits(1, 16 << 20), &["pairs"]).unwrap();
    assert_eq!(snaps[0].chunks, 2);

    let records = backups(&db);
    let slots: Vec<String> = records.iter().map(slot_prefix).collect();
    assert_eq!(slots, vec!["backup_1", "backup_2", "backup_4", "backup_3"]);
    assert!(records[2].content.contains("'2'"));
    assert!(records[3].content.contains("'1'"));

    db.execute_batch("DELETE FROM pairs; ALTER TABLE pairs ADD COLUMN extra INTEGER;")
        .unwrap();
    replay(&db);
    let rows = db
        .query("SELECT * FROM pairs ORDER BY id", &[])
        .unwrap();
    assert_eq!(
        rows,
        vec![
            vec![Some("1".to_string()), Some("a".to_string())],
            vec![Some("2".to_string()), Some("b".to_string())],
        ]
    );
}

#[test]
fn test_indexes_are_rebuilt_after_the_data() {
    let db = setup();
    db.execute_batch(
        "CREATE TABLE tags (id INTEGER, label VARCHAR);
         INSERT INTO tags VALUES (1, 'red'), (2, 'blue');
         CREATE UNIQUE INDEX tags_label_idx ON tags (label);",
    )
    .unwrap();

    let snaps = run_backup(&db, limits(250_000, 16 << 20), &["tags"]).unwrap();
    assert_eq!(snaps[0].indexes, 1);

    let records = backups(&db);
    let slots: Vec<String> = records.iter().map(slot_prefix).collect();
    assert_eq!(slots, vec!["backup_1", "backup_2", "backup_3", "backup_ix1"]);
    assert!(records[3].content.contains("tags_label_idx"));

    db.execute_batch("DROP INDEX tags_label_idx; INSERT INTO tags VALUES (3, 'red');")
        .unwrap();
    replay(&db);

    let indexes = db
        .query(
            "SELECT index_name FROM duckdb_indexes() WHERE table_name = 'tags'",
            &[],
        )
        .unwrap();
    assert_eq!(indexes, vec![vec![Some("tags_label_idx".to_string())]]);
    assert_eq!(db.query("SELECT id FROM tags ORDER BY id", &[]).unwrap().len(), 2);
    assert!(db
        .execute_batch("INSERT INTO tags VALUES (4, 'blue')")
        .is_err());
}

#[test]
fn test_split_threshold_chunks_cover_every_row_once() {
    let db = setup();
    db.execute_batch(
        "CREATE TABLE items AS SELECT range AS id, 'item_' || range AS label FROM range(200)",
    )
    .unwrap();
    let before = items(&db);

    let snaps = run_backup(&db, limits(300, 16 << 20), &["items"]).unwrap();
    assert_eq!(snaps[0].rows, 200);
    assert!(snaps[0].chunks > 1, "expected several chunks: {snaps:?}");

    let inserts: Vec<_> = backups(&db)
        .into_iter()
        .filter(|r| r.content.starts_with("INSERT"))
        .collect();
    assert_eq!(inserts.len(), snaps[0].chunks);

    db.execute_batch("DROP TABLE items").unwrap();
    replay(&db);
    assert_eq!(items(&db), before);
}

#[test]
fn test_packet_limit_bounds_chunks() {
    let db = setup();
    db.execute_batch(
        "CREATE TABLE items AS SELECT range AS id, 'item_' || range AS label FROM range(20)",
    )
    .unwrap();
    let before = items(&db);

    let snaps = run_backup(&db, limits(250_000, 300), &["items"]).unwrap();
    assert!(snaps[0].chunks > 1);
    for record in backups(&db) {
        assert!(record.content.len() < 300, "{}", record.content);
    }

    db.execute_batch("DROP TABLE items").unwrap();
    replay(&db);
    assert_eq!(items(&db), before);
}

#[test]
fn test_nulls_survive_round_trip() {
    let db = setup();
    db.execute_batch(
        "CREATE TABLE notes (id INTEGER, body VARCHAR, score DOUBLE); \
         INSERT INTO notes VALUES (1, NULL, 1.5), (2, 'it''s', NULL);",
    )
    .unwrap();
    let before = db.query("SELECT * FROM notes ORDER BY id", &[]).unwrap();

    run_backup(&db, limits(250_000, 16 << 20), &["notes"]).unwrap();
    db.execute_batch("UPDATE notes SET body = 'changed', score = 0").unwrap();
    replay(&db);

    let after = db.query("SELECT * FROM notes ORDER BY id", &[]).unwrap();
    assert_eq!(after, before);
}

#[test]
fn test_empty_table_gets_create_and_drop() {
    let db = setup();
    db.execute_batch("CREATE TABLE empty_t (id INTEGER)").unwrap();

    let snaps = run_backup(&db, limits(250_000, 16 << 20), &["empty_t"]).unwrap();
    assert_eq!(snaps[0].rows, 0);
    assert_eq!(snaps[0].chunks, 0);
    let slots: Vec<String> = backups(&db).iter().map(slot_prefix).collect();
    assert_eq!(slots, vec!["backup_1", "backup_2"]);
}

#[test]
fn test_absent_table_records_only_drop() {
    let db = setup();
    let snaps = run_backup(&db, limits(250_000, 16 << 20), &["future"]).unwrap();
    assert!(!snaps[0].existed);

    let records = backups(&db);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].content, "DROP TABLE IF EXISTS \"future\";");

    db.execute_batch("CREATE TABLE future (id INTEGER)").unwrap();
    replay(&db);
    assert!(db.describe_table("future").unwrap().is_none());
}

#[test]
fn test_views_are_skipped() {
    let db = setup();
    db.execute_batch("CREATE VIEW v_answer AS SELECT 42 AS answer")
        .unwrap();
    let snaps = run_backup(&db, limits(250_000, 16 << 20), &["v_answer"]).unwrap();
    assert!(snaps.is_empty());
    assert!(backups(&db).is_empty());
}

#[test]
fn test_backup_without_ledger_fails() {
    let db = DuckDbBackend::in_memory().unwrap();
    db.execute_batch("CREATE TABLE t (id INTEGER)").unwrap();
    let err = run_backup(&db, limits(250_000, 16 << 20), &["t"]).unwrap_err();
    assert!(matches!(err, EngineError::Snapshot { .. }));
}

#[test]
fn test_chunker_flushes_on_split() {
    let db = DuckDbBackend::in_memory().unwrap();
    let cols = vec!["a".to_string()];
    let mut chunker = InsertChunker::new(&db, "\"t\"", &cols, limits(40, 16 << 20));
    assert!(chunker.push(&[Some("x".to_string())]).is_none());
    let flushed = chunker.push(&[None]).unwrap();
    assert_eq!(flushed, "INSERT INTO \"t\" (\"a\") VALUES\n('x'),\n(NULL);");
    assert!(chunker.finish().is_none());
}
