//! Execution ledger.
//!
//! Every executed change script and every generated backup statement is a
//! row of `dbv_queries`, unique on `(version, name, fingerprint)`. Script
//! rows answer "already applied?"; `backup_*` rows are the undo data a
//! rollback replays, newest first.
//!
//! Rows are never deleted. Rolling a version back retires its rows
//! (`rolled_back = true`) so that they no longer count as applied and are
//! never replayed again.

use crate::error::{EngineError, EngineResult};
use crate::schema::LEDGER_TABLE;
use dbv_core::Version;
use dbv_db::{Backend, DbError, Row, SqlValue};
use serde::Serialize;

/// Name prefix of synthetic backup records
pub const BACKUP_PREFIX: &str = "backup_";

/// One ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerRecord {
    /// Creation sequence number
    pub seq: i64,
    pub version: Version,
    pub name: String,
    pub fingerprint: String,
    pub content: String,
    pub executed_at: String,
}

impl LedgerRecord {
    /// Whether this is a synthetic backup statement
    pub fn is_backup(&self) -> bool {
        self.name.starts_with(BACKUP_PREFIX)
    }
}

/// Live record counts of one version
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerSummary {
    pub version: Version,
    pub scripts: u64,
    pub backups: u64,
}

/// Ledger access over a backend
#[derive(Clone, Copy)]
pub struct Ledger<'a> {
    db: &'a dyn Backend,
}

const RECORD_COLUMNS: &str =
    "seq, version, name, fingerprint, content, CAST(executed_at AS VARCHAR)";

impl<'a> Ledger<'a> {
    pub fn new(db: &'a dyn Backend) -> Self {
        Self { db }
    }

    /// Whether a live record with exactly this triple exists.
    ///
    /// A missing ledger table (first run) means nothing has been applied.
    pub fn already_applied(
        &self,
        version: Version,
        name: &str,
        fingerprint: &str,
    ) -> EngineResult<bool> {
        let sql = format!(
            "SELECT count(*) FROM {LEDGER_TABLE} \
             WHERE version = ? AND name = ? AND fingerprint = ? AND NOT rolled_back"
        );
        let params: [SqlValue; 3] = [version.number().into(), name.into(), fingerprint.into()];
        match self.db.query(&sql, &params) {
            Ok(rows) => Ok(parse_count(&rows)? > 0),
            Err(DbError::TableNotFound(_)) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    /// Insert a record unless the same triple already exists.
    ///
    /// A retired record with the same triple is revived and takes a fresh
    /// `seq`, so it sorts after everything recorded before it. Returns
    /// `false` when the ledger table does not exist yet, which happens while
    /// version 0 is creating it.
    pub fn record(
        &self,
        version: Version,
        name: &str,
        fingerprint: &str,
        content: &str,
    ) -> EngineResult<bool> {
        let revive = format!(
            "UPDATE {LEDGER_TABLE} \
             SET rolled_back = false, seq = nextval('dbv_queries_seq'), executed_at = current_timestamp \
             WHERE version = ? AND name = ? AND fingerprint = ? AND rolled_back"
        );
        let key: [SqlValue; 3] = [version.number().into(), name.into(), fingerprint.into()];
        let revived = match self.db.execute(&revive, &key) {
            Ok(n) => n,
            Err(DbError::TableNotFound(_)) => {
                log::debug!("Ledger table missing; {version}/{name} not recorded");
                return Ok(false);
            }
            Err(e) => return Err(e.into()),
        };
        if revived > 0 {
            return Ok(true);
        }

        let insert = format!(
            "INSERT INTO {LEDGER_TABLE} (version, name, fingerprint, content) VALUES (?, ?, ?, ?) \
             ON CONFLICT (version, name, fingerprint) DO NOTHING"
        );
        let params: [SqlValue; 4] = [
            version.number().into(),
            name.into(),
            fingerprint.into(),
            content.into(),
        ];
        self.db.execute(&insert, &params)?;
        Ok(true)
    }

    /// Live backup records of `version`, most recently created first
    pub fn list_backups(&self, version: Version) -> EngineResult<Vec<LedgerRecord>> {
        self.list_backups_after(version, 0)
    }

    /// Like [`Ledger::list_backups`], limited to records with `seq > after_seq`
    pub fn list_backups_after(
        &self,
        version: Version,
        after_seq: i64,
    ) -> EngineResult<Vec<LedgerRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {LEDGER_TABLE} \
             WHERE version = ? AND starts_with(name, ?) AND NOT rolled_back AND seq > ? \
             ORDER BY seq DESC"
        );
        self.fetch(
            &sql,
            &[
                version.number().into(),
                BACKUP_PREFIX.into(),
                after_seq.into(),
            ],
        )
    }

    /// Highest sequence number handed out so far, 0 for an empty ledger
    pub fn last_seq(&self) -> EngineResult<i64> {
        let sql = format!("SELECT coalesce(max(seq), 0) FROM {LEDGER_TABLE}");
        match self.db.query(&sql, &[]) {
            Ok(rows) => rows
                .first()
                .map_or(Ok(0), |row| parse_cell(row, 0, "seq")),
            Err(DbError::TableNotFound(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Live records of `version` in creation order
    pub fn records(&self, version: Version) -> EngineResult<Vec<LedgerRecord>> {
        let sql = format!(
            "SELECT {RECORD_COLUMNS} FROM {LEDGER_TABLE} \
             WHERE version = ? AND NOT rolled_back ORDER BY seq"
        );
        self.fetch(&sql, &[version.number().into()])
    }

    /// Retire every live record of `version`, returning how many changed
    pub fn retire(&self, version: Version) -> EngineResult<usize> {
        self.retire_after(version, 0)
    }

    /// Like [`Ledger::retire`], limited to records with `seq > after_seq`
    pub fn retire_after(&self, version: Version, after_seq: i64) -> EngineResult<usize> {
        let sql = format!(
            "UPDATE {LEDGER_TABLE} SET rolled_back = true \
             WHERE version = ? AND NOT rolled_back AND seq > ?"
        );
        let params: [SqlValue; 2] = [version.number().into(), after_seq.into()];
        match self.db.execute(&sql, &params) {
            Ok(n) => Ok(n),
            Err(DbError::TableNotFound(_)) => Ok(0),
            Err(e) => Err(e.into()),
        }
    }

    /// Live script and backup counts per version, ascending
    pub fn summary(&self) -> EngineResult<Vec<LedgerSummary>> {
        let sql = format!(
            "SELECT version, \
                    count(*) FILTER (WHERE NOT starts_with(name, ?)), \
                    count(*) FILTER (WHERE starts_with(name, ?)) \
             FROM {LEDGER_TABLE} WHERE NOT rolled_back GROUP BY version ORDER BY version"
        );
        let params: [SqlValue; 2] = [BACKUP_PREFIX.into(), BACKUP_PREFIX.into()];
        let rows = match self.db.query(&sql, &params) {
            Ok(rows) => rows,
            Err(DbError::TableNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        rows.iter()
            .map(|row| {
                Ok(LedgerSummary {
                    version: Version::new(parse_cell(row, 0, "version")?),
                    scripts: parse_cell(row, 1, "scripts")?,
                    backups: parse_cell(row, 2, "backups")?,
                })
            })
            .collect()
    }

    fn fetch(&self, sql: &str, params: &[SqlValue]) -> EngineResult<Vec<LedgerRecord>> {
        let rows = match self.db.query(sql, params) {
            Ok(rows) => rows,
            Err(DbError::TableNotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        rows.iter().map(record_from_row).collect()
    }
}

fn record_from_row(row: &Row) -> EngineResult<LedgerRecord> {
    Ok(LedgerRecord {
        seq: parse_cell(row, 0, "seq")?,
        version: Version::new(parse_cell(row, 1, "version")?),
        name: text_cell(row, 2, "name")?,
        fingerprint: text_cell(row, 3, "fingerprint")?,
        content: text_cell(row, 4, "content")?,
        executed_at: text_cell(row, 5, "executed_at")?,
    })
}

fn text_cell(row: &Row, idx: usize, column: &str) -> EngineResult<String> {
    row.get(idx)
        .cloned()
        .flatten()
        .ok_or_else(|| EngineError::StateCorrupt(format!("{LEDGER_TABLE}.{column} is NULL")))
}

fn parse_cell<T: std::str::FromStr>(
    row: &Row,
    idx: usize,
    column: &str,
) -> EngineResult<T> {
    let text = text_cell(row, idx, column)?;
    text.parse().map_err(|_| {
        EngineError::StateCorrupt(format!("{LEDGER_TABLE}.{column} is not a number: '{text}'"))
    })
}

fn parse_count(rows: &[Row]) -> EngineResult<u64> {
    rows.first()
        .map_or(Ok(0), |row| parse_cell(row, 0, "count"))
}

#[cfg(test)]
#[path = "ledger_test.rs"]
mod tests;
