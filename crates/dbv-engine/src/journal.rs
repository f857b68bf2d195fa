//! Execution journal: progress output and the `dbv_log` table.
//!
//! The journal is observability only. Nothing reads it back to make a
//! control decision, and a failure to write it never fails a deployment.

use crate::schema::LOG_TABLE;
use dbv_core::Version;
use dbv_db::{Backend, DbError, SqlValue};
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Outcome of one script or replayed statement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ScriptStatus {
    Ok,
    Skipped,
    Failed,
}

impl ScriptStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ScriptStatus::Ok => "OK",
            ScriptStatus::Skipped => "SKIPPED",
            ScriptStatus::Failed => "FAILED",
        }
    }
}

impl fmt::Display for ScriptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One journal entry
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogRecord {
    pub version: Version,
    pub name: String,
    pub status: ScriptStatus,
    pub message: String,
    pub execution_time: Duration,
}

/// Writes progress lines and log rows
pub struct Journal<'a> {
    db: &'a dyn Backend,
    echo: bool,
}

impl<'a> Journal<'a> {
    /// Journal that prints progress lines to stdout
    pub fn new(db: &'a dyn Backend) -> Self {
        Self { db, echo: true }
    }

    /// Journal that only writes log rows
    pub fn quiet(db: &'a dyn Backend) -> Self {
        Self { db, echo: false }
    }

    /// Print a human progress line
    pub fn progress(&self, line: impl AsRef<str>) {
        if self.echo {
            println!("{}", line.as_ref());
        }
    }

    /// Print and persist one entry.
    ///
    /// A missing log table (version 0 still bootstrapping) is skipped
    /// silently; other write failures are logged and ignored.
    pub fn record(&self, entry: &LogRecord) {
        if self.echo {
            let secs = entry.execution_time.as_secs_f64();
            if entry.message.is_empty() {
                println!(
                    "  [{}] {}/{} ({secs:.3}s)",
                    entry.status, entry.version, entry.name
                );
            } else {
                println!(
                    "  [{}] {}/{} ({secs:.3}s): {}",
                    entry.status, entry.version, entry.name, entry.message
                );
            }
        }

        let sql = format!(
            "INSERT INTO {LOG_TABLE} (version, name, status, message, execution_time) \
             VALUES (?, ?, ?, ?, ?)"
        );
        let params: [SqlValue; 5] = [
            entry.version.number().into(),
            entry.name.as_str().into(),
            entry.status.as_str().into(),
            entry.message.as_str().into(),
            entry.execution_time.as_secs_f64().into(),
        ];
        match self.db.execute(&sql, &params) {
            Ok(_) => {}
            Err(DbError::TableNotFound(_)) => {
                log::debug!("{LOG_TABLE} missing; entry for {} not persisted", entry.name);
            }
            Err(e) => log::warn!("Failed to write {LOG_TABLE} entry for {}: {e}", entry.name),
        }
    }

    /// Persisted entries of `version` in insertion order
    pub fn entries(&self, version: Version) -> Vec<(String, ScriptStatus, String)> {
        let sql = format!(
            "SELECT name, status, message FROM {LOG_TABLE} WHERE version = ? ORDER BY rowid"
        );
        let rows = match self.db.query(&sql, &[version.number().into()]) {
            Ok(rows) => rows,
            Err(e) => {
                log::debug!("Cannot read {LOG_TABLE}: {e}");
                return Vec::new();
            }
        };
        rows.into_iter()
            .filter_map(|row| {
                let mut cells = row.into_iter().map(Option::unwrap_or_default);
                let name = cells.next()?;
                let status = match cells.next()?.as_str() {
                    "OK" => ScriptStatus::Ok,
                    "SKIPPED" => ScriptStatus::Skipped,
                    _ => ScriptStatus::Failed,
                };
                let message = cells.next()?;
                Some((name, status, message))
            })
            .collect()
    }
}
