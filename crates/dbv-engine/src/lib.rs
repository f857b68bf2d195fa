//! dbv-engine - Migration engine for dbv
//!
//! Change scripts are grouped into version units and executed at most once,
//! as recorded by a fingerprinting ledger. Before a version mutates
//! anything, the tables it touches are dumped into the same ledger as
//! replayable backup statements; rolling a version back replays them newest
//! first. The [`Deployer`] walks a database forward or backward between
//! versions and persists where it ended up.

pub mod change_script;
pub mod context;
pub mod deployer;
pub mod error;
pub mod journal;
pub mod ledger;
pub mod schema;
pub mod snapshot;
pub mod state;
pub mod version_unit;

pub use change_script::{ChangeScript, ScriptOutcome};
pub use context::RunContext;
pub use deployer::{
    DeployOptions, DeployOutcome, DeployPlan, DeployReport, Deployer, Direction, StatusReport,
};
pub use error::{EngineError, EngineResult};
pub use journal::{Journal, LogRecord, ScriptStatus};
pub use ledger::{Ledger, LedgerRecord, LedgerSummary, BACKUP_PREFIX};
pub use schema::{write_bootstrap_scripts, BOOTSTRAP_SCRIPTS};
pub use snapshot::{SnapshotGenerator, SnapshotLimits, TableSnapshot};
pub use state::{StateStore, StoredState, VersionState};
pub use version_unit::VersionUnit;
