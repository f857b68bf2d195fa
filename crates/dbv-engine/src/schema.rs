//! Bookkeeping tables and the version-0 scripts that create them.

use dbv_core::{CoreError, CoreResult};
use std::path::Path;

/// Ledger of executed change scripts and backup statements
pub const LEDGER_TABLE: &str = "dbv_queries";

/// Key/value version state
pub const STATE_TABLE: &str = "dbv_state";

/// Append-only execution log
pub const LOG_TABLE: &str = "dbv_log";

/// `seq` orders ledger rows strictly; timestamps can collide.
pub const LEDGER_DDL: &str = "\
CREATE SEQUENCE IF NOT EXISTS dbv_queries_seq;
CREATE TABLE IF NOT EXISTS dbv_queries (
    seq BIGINT NOT NULL DEFAULT nextval('dbv_queries_seq'),
    version INTEGER NOT NULL,
    name VARCHAR NOT NULL,
    executed_at TIMESTAMP NOT NULL DEFAULT current_timestamp,
    fingerprint VARCHAR NOT NULL,
    content VARCHAR NOT NULL,
    rolled_back BOOLEAN NOT NULL DEFAULT false,
    UNIQUE (version, name, fingerprint)
);
";

pub const STATE_DDL: &str = "\
CREATE TABLE IF NOT EXISTS dbv_state (
    name VARCHAR PRIMARY KEY,
    value VARCHAR NOT NULL
);
";

pub const LOG_DDL: &str = "\
CREATE TABLE IF NOT EXISTS dbv_log (
    logged_at TIMESTAMP NOT NULL DEFAULT current_timestamp,
    version INTEGER NOT NULL,
    name VARCHAR NOT NULL,
    status VARCHAR NOT NULL,
    message VARCHAR NOT NULL,
    execution_time DOUBLE NOT NULL
);
";

/// Canonical version-0 scripts as `(file name, sql)`, in execution order
pub const BOOTSTRAP_SCRIPTS: &[(&str, &str)] = &[
    ("dbc1_dbv_queries.sql", LEDGER_DDL),
    ("dbc2_dbv_state.sql", STATE_DDL),
    ("dbc3_dbv_log.sql", LOG_DDL),
];

/// Write the version-0 scripts into `dir`, creating it if needed.
///
/// Existing files are left untouched.
pub fn write_bootstrap_scripts(dir: &Path) -> CoreResult<()> {
    let io_err = |path: &Path, e| CoreError::IoWithPath {
        path: path.display().to_string(),
        source: e,
    };
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    for (name, sql) in BOOTSTRAP_SCRIPTS {
        let path = dir.join(name);
        if path.exists() {
            log::debug!("Keeping existing {}", path.display());
            continue;
        }
        std::fs::write(&path, sql).map_err(|e| io_err(&path, e))?;
    }
    Ok(())
}
