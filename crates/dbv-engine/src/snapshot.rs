//! Table backups stored as ledger records.
//!
//! Before a version mutates anything, every impacted table is captured as
//! synthetic `backup_*` records of that version:
//!
//! ```text
//! backup_ix<n>_<table>_<hash> ..  CREATE INDEX per secondary index
//! backup_3_<table>_<hash> ..      INSERT chunks, in row order
//! backup_2_<table>_<hash>         CREATE TABLE as currently defined
//! backup_1_<table>_<hash>         DROP TABLE IF EXISTS
//! ```
//!
//! Rollback replays a version's backups newest first, so the DROP runs
//! before the CREATE, which runs before the data, and the indexes are
//! rebuilt last. Tables that do not exist yet only get the DROP record,
//! which removes them again on rollback.

use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::ledger::BACKUP_PREFIX;
use dbv_core::checksum::compute_checksum_parts;
use dbv_core::{compute_checksum, SnapshotConfig, Version};
use dbv_db::{Backend, DbError, TableInfo};
use std::collections::BTreeSet;
use std::fmt;

/// Backup sequence number of the DROP record
const DROP_SLOT: usize = 1;
/// Backup sequence number of the CREATE record
const CREATE_SLOT: usize = 2;
/// Backup sequence number of the first INSERT chunk
const FIRST_CHUNK_SLOT: usize = 3;

/// Position label of a backup record within one table's backup
enum Slot {
    Numbered(usize),
    Index(usize),
}

impl fmt::Display for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Slot::Numbered(n) => write!(f, "{n}"),
            Slot::Index(n) => write!(f, "ix{n}"),
        }
    }
}

/// Size limits for INSERT chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotLimits {
    /// Flush once a chunk reaches this many bytes
    pub split_bytes: usize,
    /// Per-row allowance when projecting a chunk's size
    pub row_overhead_bytes: usize,
    /// Largest statement the backend accepts
    pub max_packet_bytes: usize,
}

impl SnapshotLimits {
    /// Combine configured limits with the backend's packet size
    pub fn new(config: &SnapshotConfig, max_packet_bytes: usize) -> Self {
        Self {
            split_bytes: config.split_bytes,
            row_overhead_bytes: config.row_overhead_bytes,
            max_packet_bytes,
        }
    }
}

/// What was captured for one table
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSnapshot {
    pub table: String,
    /// False when the table did not exist and only a DROP was recorded
    pub existed: bool,
    pub rows: usize,
    pub chunks: usize,
    /// Secondary indexes recorded for rebuild
    pub indexes: usize,
}

/// Writes backup records for impacted tables
#[derive(Debug, Clone)]
pub struct SnapshotGenerator {
    limits: SnapshotLimits,
    nonce: String,
}

impl SnapshotGenerator {
    pub fn new(limits: SnapshotLimits) -> Self {
        Self {
            limits,
            nonce: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Back up every table of `tables` (sorted order) into `version`.
    ///
    /// Views and other relations without storage are skipped.
    pub fn backup_tables(
        &self,
        ctx: &RunContext<'_>,
        version: Version,
        tables: &BTreeSet<String>,
    ) -> EngineResult<Vec<TableSnapshot>> {
        let mut snapshots = Vec::with_capacity(tables.len());
        for table in tables {
            let info = ctx.db.describe_table(table)?;
            let snapshot = match info {
                None => self.backup_absent(ctx, version, table)?,
                Some(info) if !info.kind.has_storage() => {
                    log::debug!("Skipping backup of {table}: no storage ({:?})", info.kind);
                    continue;
                }
                Some(info) => self.backup_existing(ctx, version, &info)?,
            };
            ctx.journal.progress(format!(
                "  Backed up {} ({} rows, {} chunks)",
                snapshot.table, snapshot.rows, snapshot.chunks
            ));
            snapshots.push(snapshot);
        }
        Ok(snapshots)
    }

    fn backup_absent(
        &self,
        ctx: &RunContext<'_>,
        version: Version,
        table: &str,
    ) -> EngineResult<TableSnapshot> {
        let drop = format!("DROP TABLE IF EXISTS {};", ctx.db.quote_ident(table));
        self.store(ctx, version, table, Slot::Numbered(DROP_SLOT), &drop)?;
        Ok(TableSnapshot {
            table: table.to_string(),
            existed: false,
            rows: 0,
            chunks: 0,
            indexes: 0,
        })
    }

    fn backup_existing(
        &self,
        ctx: &RunContext<'_>,
        version: Version,
        info: &TableInfo,
    ) -> EngineResult<TableSnapshot> {
        let table = info.name.as_str();
        let create = info.create_sql.clone().ok_or_else(|| EngineError::Snapshot {
            table: table.to_string(),
            reason: "catalog has no CREATE statement".to_string(),
        })?;
        let quoted = ctx.db.quote_ident(table);

        for (n, index) in info.indexes.iter().enumerate() {
            self.store(ctx, version, table, Slot::Index(n + 1), index)?;
        }

        let mut chunker = InsertChunker::new(ctx.db, &quoted, &info.columns, self.limits);
        let mut slot = FIRST_CHUNK_SLOT;
        let mut chunks = 0;
        let rows = if info.columns.is_empty() {
            0
        } else {
            let select = format!(
                "SELECT {} FROM {quoted}",
                info.columns
                    .iter()
                    .map(|c| format!("CAST({} AS VARCHAR)", ctx.db.quote_ident(c)))
                    .collect::<Vec<_>>()
                    .join(", ")
            );
            let mut on_row = |row: &[Option<String>]| -> Result<(), DbError> {
                if let Some(statement) = chunker.push(row) {
                    self.store(ctx, version, table, Slot::Numbered(slot), &statement)
                        .map_err(|e| DbError::Internal(e.to_string()))?;
                    slot += 1;
                    chunks += 1;
                }
                Ok(())
            };
            let rows = ctx
                .db
                .for_each_row(&select, &mut on_row)
                .map_err(|e| EngineError::Snapshot {
                    table: table.to_string(),
                    reason: e.to_string(),
                })?;
            if let Some(statement) = chunker.finish() {
                self.store(ctx, version, table, Slot::Numbered(slot), &statement)?;
                chunks += 1;
            }
            rows
        };

        self.store(ctx, version, table, Slot::Numbered(CREATE_SLOT), &create)?;
        let drop = format!("DROP TABLE IF EXISTS {quoted};");
        self.store(ctx, version, table, Slot::Numbered(DROP_SLOT), &drop)?;

        Ok(TableSnapshot {
            table: table.to_string(),
            existed: true,
            rows,
            chunks,
            indexes: info.indexes.len(),
        })
    }

    /// Record one backup statement; an unrecorded backup is an error
    fn store(
        &self,
        ctx: &RunContext<'_>,
        version: Version,
        table: &str,
        slot: Slot,
        statement: &str,
    ) -> EngineResult<()> {
        let name = self.backup_name(slot, table, statement);
        let recorded =
            ctx.ledger
                .record(version, &name, &compute_checksum(statement), statement)?;
        if !recorded {
            return Err(EngineError::Snapshot {
                table: table.to_string(),
                reason: "ledger table does not exist".to_string(),
            });
        }
        Ok(())
    }

    /// `backup_<slot>_<table>_<hash>`, unique per run and statement
    fn backup_name(&self, slot: Slot, table: &str, statement: &str) -> String {
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Nanos, true);
        let hash = compute_checksum_parts(&[&self.nonce, &now, statement]);
        format!("{BACKUP_PREFIX}{slot}_{}_{}", table.to_lowercase(), &hash[..12])
    }
}

/// Accumulates rows into size-bounded INSERT statements
struct InsertChunker<'a> {
    db: &'a dyn Backend,
    header: String,
    limits: SnapshotLimits,
    sql: String,
    rows: usize,
}

impl<'a> InsertChunker<'a> {
    fn new(
        db: &'a dyn Backend,
        quoted_table: &str,
        columns: &[String],
        limits: SnapshotLimits,
    ) -> Self {
        let column_list = columns
            .iter()
            .map(|c| db.quote_ident(c))
            .collect::<Vec<_>>()
            .join(", ");
        Self {
            db,
            header: format!("INSERT INTO {quoted_table} ({column_list}) VALUES\n"),
            limits,
            sql: String::new(),
            rows: 0,
        }
    }

    /// Append a row; returns a finished statement when the chunk is full.
    ///
    /// A chunk is full once it reaches `split_bytes`, or once its length
    /// plus twice the average row length plus the per-row overhead of every
    /// row in it would reach the packet limit.
    fn push(&mut self, row: &[Option<String>]) -> Option<String> {
        if self.rows == 0 {
            self.sql.push_str(&self.header);
        } else {
            self.sql.push_str(",\n");
        }
        self.sql.push('(');
        for (i, value) in row.iter().enumerate() {
            if i > 0 {
                self.sql.push_str(", ");
            }
            match value {
                Some(v) => self.sql.push_str(&self.db.quote(v)),
                None => self.sql.push_str("NULL"),
            }
        }
        self.sql.push(')');
        self.rows += 1;

        let len = self.sql.len();
        let avg_row = (len - self.header.len()) / self.rows;
        let projected = len + avg_row * 2 + self.limits.row_overhead_bytes * (self.rows + 1);
        if len >= self.limits.split_bytes || projected >= self.limits.max_packet_bytes {
            self.take()
        } else {
            None
        }
    }

    /// Flush whatever is left after the last row
    fn finish(&mut self) -> Option<String> {
        if self.rows == 0 {
            None
        } else {
            self.take()
        }
    }

    fn take(&mut self) -> Option<String> {
        self.rows = 0;
        let mut statement = std::mem::take(&mut self.sql);
        statement.push(';');
        Some(statement)
    }
}

#[cfg(test)]
#[path = "snapshot_test.rs"]
mod tests;
