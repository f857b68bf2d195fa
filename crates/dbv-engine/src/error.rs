//! Error types for dbv-engine

use dbv_core::CoreError;
use dbv_db::DbError;
use thiserror::Error;

/// Migration engine errors.
///
/// Only [`EngineError::NotInitialized`] is recovered internally (first-run
/// bootstrap); every other variant aborts the deployment.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Layout or configuration problem
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database failure outside a change script
    #[error(transparent)]
    Db(#[from] DbError),

    /// A change script was rejected at load time (G001)
    #[error("[G001] Invalid change script {version}/{name}: {reason}")]
    Script {
        version: String,
        name: String,
        reason: String,
    },

    /// Requested version outside `0..=highest_possible` (G002)
    #[error("[G002] Target version {target} is out of range (highest possible version is {highest_possible})")]
    VersionOutOfRange { target: u32, highest_possible: u32 },

    /// Bookkeeping tables do not exist yet (G003)
    #[error("[G003] dbv bookkeeping tables are missing: {0}")]
    NotInitialized(String),

    /// Bookkeeping data cannot be interpreted (G004)
    #[error("[G004] Corrupt bookkeeping data: {0}")]
    StateCorrupt(String),

    /// A table could not be backed up (G005)
    #[error("[G005] Backup of table '{table}' failed: {reason}")]
    Snapshot { table: String, reason: String },

    /// Pre- or postscript could not be loaded or validated (G006)
    #[error("[G006] Invalid {kind} {path}: {reason}")]
    Hook {
        kind: String,
        path: String,
        reason: String,
    },
}

/// Result type alias for EngineError
pub type EngineResult<T> = Result<T, EngineError>;
