//! All change scripts of one version.

use crate::change_script::ChangeScript;
use crate::context::RunContext;
use crate::error::EngineResult;
use crate::journal::{LogRecord, ScriptStatus};
use dbv_core::{ChangeLayout, Version};
use dbv_db::Backend;
use dbv_sql::TableExtractor;
use std::collections::BTreeSet;
use std::time::Instant;

/// The ordered change scripts of one version directory
#[derive(Debug, Clone)]
pub struct VersionUnit {
    version: Version,
    scripts: Vec<ChangeScript>,
}

impl VersionUnit {
    /// Load and validate every script of `version`.
    ///
    /// A missing version directory loads as an empty unit. Malformed names,
    /// duplicate ids, unreadable files, invalid SQL and scripts without
    /// tables are all fatal.
    pub fn load(
        layout: &ChangeLayout,
        version: Version,
        db: &dyn Backend,
        extractor: &dyn TableExtractor,
    ) -> EngineResult<Self> {
        let scripts = layout
            .scripts(version)?
            .iter()
            .map(|file| ChangeScript::from_file(version, file, db, extractor))
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(Self { version, scripts })
    }

    /// Build a unit from scripts already loaded, in execution order
    pub fn from_scripts(version: Version, scripts: Vec<ChangeScript>) -> Self {
        Self { version, scripts }
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn scripts(&self) -> &[ChangeScript] {
        &self.scripts
    }

    pub fn is_empty(&self) -> bool {
        self.scripts.is_empty()
    }

    /// Union of the tables touched by scripts not applied yet
    pub fn impact_set(&self, ctx: &RunContext<'_>) -> EngineResult<BTreeSet<String>> {
        let mut tables = BTreeSet::new();
        for script in &self.scripts {
            if !script.is_applied(ctx)? {
                tables.extend(script.affected_tables().iter().cloned());
            }
        }
        Ok(tables)
    }

    /// Back up, then run every script in order.
    ///
    /// Version 0 is never backed up. A backup failure aborts before any
    /// script runs. A script failure rolls back what this call did: backups
    /// taken by earlier deployments of the same version are left alone.
    pub fn deploy(&self, ctx: &RunContext<'_>) -> bool {
        ctx.journal.progress(format!(
            "Deploying {} ({} scripts)",
            self.version,
            self.scripts.len()
        ));

        let watermark = match ctx.ledger.last_seq() {
            Ok(seq) => seq,
            Err(e) => {
                log::warn!("Cannot read ledger before deploying {}: {e}", self.version);
                return false;
            }
        };

        if !self.version.is_zero() {
            let backed_up = self
                .impact_set(ctx)
                .and_then(|tables| ctx.snapshots.backup_tables(ctx, self.version, &tables));
            if let Err(e) = backed_up {
                log::warn!("Backup of {} failed: {e}", self.version);
                ctx.journal
                    .progress(format!("Backup of {} failed, nothing executed: {e}", self.version));
                return false;
            }
        }

        for script in &self.scripts {
            let outcome = script.run(ctx);
            if !outcome.succeeded() {
                ctx.journal.progress(format!(
                    "{} failed at {}: {}; rolling back",
                    self.version,
                    script.name(),
                    outcome.message
                ));
                self.replay_backups(ctx, watermark);
                return false;
            }
        }
        true
    }

    /// Replay this version's backups newest first, then retire its ledger
    /// records.
    ///
    /// Individual replay failures are journaled and skipped. Returns false
    /// only when the ledger itself cannot be read or updated.
    pub fn rollback(&self, ctx: &RunContext<'_>) -> bool {
        self.replay_backups(ctx, 0)
    }

    /// Roll back the records of this version with `seq > after_seq`
    fn replay_backups(&self, ctx: &RunContext<'_>, after_seq: i64) -> bool {
        ctx.journal
            .progress(format!("Rolling back {}", self.version));

        let backups = match ctx.ledger.list_backups_after(self.version, after_seq) {
            Ok(backups) => backups,
            Err(e) => {
                log::warn!("Cannot list backups of {}: {e}", self.version);
                return false;
            }
        };

        for backup in &backups {
            let started = Instant::now();
            let (status, message) = match ctx.db.execute_batch(&backup.content) {
                Ok(()) => (ScriptStatus::Ok, String::new()),
                Err(e) => {
                    log::warn!("Replay of {} failed: {e}", backup.name);
                    (ScriptStatus::Failed, e.to_string())
                }
            };
            ctx.journal.record(&LogRecord {
                version: self.version,
                name: backup.name.clone(),
                status,
                message,
                execution_time: started.elapsed(),
            });
        }

        match ctx.ledger.retire_after(self.version, after_seq) {
            Ok(retired) => {
                log::debug!("Retired {retired} ledger records of {}", self.version);
                true
            }
            Err(e) => {
                log::warn!("Cannot retire ledger records of {}: {e}", self.version);
                false
            }
        }
    }
}

#[cfg(test)]
#[path = "version_unit_test.rs"]
mod tests;
