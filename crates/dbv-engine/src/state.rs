//! Persisted version state (`dbv_state`).

use crate::error::{EngineError, EngineResult};
use crate::schema::STATE_TABLE;
use dbv_core::Version;
use dbv_db::{Backend, DbError, SqlValue};
use serde::Serialize;

pub const CURRENT_VERSION_KEY: &str = "current_version";
pub const HIGHEST_VERSION_KEY: &str = "highest_version";

/// Version bookkeeping of one database.
///
/// `highest_version` is a high-water mark: rollbacks lower
/// `current_version` but never `highest_version`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct VersionState {
    pub current_version: Version,
    pub highest_version: Version,
    pub highest_possible_version: Version,
}

impl VersionState {
    /// Build a state, lifting `highest_version` to at least `current_version`
    pub fn new(current: Version, highest: Version, highest_possible: Version) -> Self {
        Self {
            current_version: current,
            highest_version: highest.max(current),
            highest_possible_version: highest_possible,
        }
    }
}

/// The two persisted values
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StoredState {
    pub current_version: Version,
    pub highest_version: Version,
}

/// Reads and writes `dbv_state`
pub struct StateStore<'a> {
    db: &'a dyn Backend,
}

impl<'a> StateStore<'a> {
    pub fn new(db: &'a dyn Backend) -> Self {
        Self { db }
    }

    /// Read the stored state.
    ///
    /// Fails with [`EngineError::NotInitialized`] when the state table does
    /// not exist. Keys never written read as version 0.
    pub fn read(&self) -> EngineResult<StoredState> {
        let sql = format!("SELECT name, value FROM {STATE_TABLE}");
        let rows = match self.db.query(&sql, &[]) {
            Ok(rows) => rows,
            Err(DbError::TableNotFound(msg)) => return Err(EngineError::NotInitialized(msg)),
            Err(e) => return Err(e.into()),
        };

        let mut state = StoredState::default();
        for row in rows {
            let (Some(Some(name)), Some(Some(value))) = (row.first(), row.get(1)) else {
                continue;
            };
            let slot = match name.as_str() {
                CURRENT_VERSION_KEY => &mut state.current_version,
                HIGHEST_VERSION_KEY => &mut state.highest_version,
                _ => continue,
            };
            let number = value.trim().parse::<u32>().map_err(|_| {
                EngineError::StateCorrupt(format!("{STATE_TABLE}.{name} is not a version: '{value}'"))
            })?;
            *slot = Version::new(number);
        }
        Ok(state)
    }

    /// Upsert both values in one transaction
    pub fn write(&self, current: Version, highest: Version) -> EngineResult<()> {
        let sql = format!(
            "INSERT INTO {STATE_TABLE} (name, value) VALUES (?, ?) \
             ON CONFLICT (name) DO UPDATE SET value = excluded.value"
        );
        self.transaction(|| {
            for (key, version) in [
                (CURRENT_VERSION_KEY, current),
                (HIGHEST_VERSION_KEY, highest),
            ] {
                let params: [SqlValue; 2] = [key.into(), version.number().to_string().into()];
                self.db.execute(&sql, &params)?;
            }
            Ok(())
        })
    }

    /// Run `body` between `BEGIN` and `COMMIT`, rolling back on error
    fn transaction<T>(&self, body: impl FnOnce() -> EngineResult<T>) -> EngineResult<T> {
        self.db.execute_batch("BEGIN TRANSACTION")?;
        let result = body();
        match &result {
            Ok(_) => {
                if let Err(commit_err) = self.db.execute_batch("COMMIT") {
                    let _ = self.db.execute_batch("ROLLBACK");
                    return Err(commit_err.into());
                }
            }
            Err(_) => {
                let _ = self.db.execute_batch("ROLLBACK");
            }
        }
        result
    }
}
