//! Collaborators shared by one deployment run.

use crate::journal::Journal;
use crate::ledger::Ledger;
use crate::snapshot::SnapshotGenerator;
use dbv_db::Backend;

/// Everything a version unit and its scripts need while running
pub struct RunContext<'a> {
    pub db: &'a dyn Backend,
    pub ledger: Ledger<'a>,
    pub journal: &'a Journal<'a>,
    pub snapshots: SnapshotGenerator,
}

impl<'a> RunContext<'a> {
    pub fn new(db: &'a dyn Backend, journal: &'a Journal<'a>, snapshots: SnapshotGenerator) -> Self {
        Self {
            db,
            ledger: Ledger::new(db),
            journal,
            snapshots,
        }
    }
}
