//! Deploy orchestration: resolve state, plan the traversal, run it, persist.

use crate::change_script::ChangeScript;
use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::journal::Journal;
use crate::ledger::{Ledger, LedgerSummary};
use crate::schema::BOOTSTRAP_SCRIPTS;
use crate::snapshot::{SnapshotGenerator, SnapshotLimits};
use crate::state::{StateStore, StoredState, VersionState};
use crate::version_unit::VersionUnit;
use dbv_core::{ChangeLayout, Config, DeployMode, SnapshotConfig, Version};
use dbv_db::Backend;
use dbv_sql::{KeywordScanner, TableExtractor};
use serde::Serialize;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Deployment settings taken from configuration
#[derive(Debug, Clone, Default)]
pub struct DeployOptions {
    pub prescript: Option<PathBuf>,
    pub postscript: Option<PathBuf>,
    pub snapshot: SnapshotConfig,
}

impl DeployOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            prescript: config.prescript_path(),
            postscript: config.postscript_path(),
            snapshot: config.snapshot,
        }
    }
}

/// Traversal direction between two versions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Same,
    Forward,
    Backward,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Direction::Same => write!(f, "same"),
            Direction::Forward => write!(f, "forward"),
            Direction::Backward => write!(f, "backward"),
        }
    }
}

/// Versions to visit, in visiting order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeployPlan {
    /// Re-deploy the current version to catch up on new scripts
    Same(Version),
    /// Deploy `current+1 ..= target`, ascending
    Forward(Vec<Version>),
    /// Roll back `current ..= target+1`, descending
    Backward(Vec<Version>),
}

impl DeployPlan {
    pub fn between(current: Version, target: Version) -> Self {
        if target == current {
            DeployPlan::Same(target)
        } else if target > current {
            DeployPlan::Forward(current.forward_to(target).collect())
        } else {
            DeployPlan::Backward(current.backward_to(target).collect())
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            DeployPlan::Same(_) => Direction::Same,
            DeployPlan::Forward(_) => Direction::Forward,
            DeployPlan::Backward(_) => Direction::Backward,
        }
    }

    pub fn versions(&self) -> Vec<Version> {
        match self {
            DeployPlan::Same(v) => vec![*v],
            DeployPlan::Forward(vs) | DeployPlan::Backward(vs) => vs.clone(),
        }
    }
}

/// How a deployment ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DeployOutcome {
    /// Traversal completed and state was persisted
    Deployed,
    /// Validate mode: everything loaded, nothing executed
    Validated,
    /// A version or hook failed; state was not persisted
    Failed {
        version: Option<Version>,
        reason: String,
    },
}

/// Summary of one `deploy` call
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DeployReport {
    /// Current version before the run; `None` if the database was not
    /// initialized and the run did not initialize it
    pub from: Option<Version>,
    pub to: Version,
    pub direction: Direction,
    pub mode: DeployMode,
    pub outcome: DeployOutcome,
}

impl DeployReport {
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, DeployOutcome::Failed { .. })
    }
}

/// Read-only view of a database's version bookkeeping
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusReport {
    pub initialized: bool,
    pub current_version: Option<Version>,
    pub highest_version: Option<Version>,
    pub highest_possible_version: Version,
    pub ledger: Vec<LedgerSummary>,
}

/// A validated pre- or postscript
struct HookScript {
    kind: &'static str,
    path: PathBuf,
    content: String,
}

impl HookScript {
    fn load(kind: &'static str, path: &Path, db: &dyn Backend) -> EngineResult<Self> {
        let hook_err = |reason: String| EngineError::Hook {
            kind: kind.to_string(),
            path: path.display().to_string(),
            reason,
        };
        let content = fs::read_to_string(path).map_err(|e| hook_err(e.to_string()))?;
        db.validate(&content).map_err(|e| hook_err(e.to_string()))?;
        Ok(Self {
            kind,
            path: path.to_path_buf(),
            content,
        })
    }

    fn run(&self, journal: &Journal<'_>, db: &dyn Backend) -> Result<(), String> {
        journal.progress(format!("Running {} {}", self.kind, self.path.display()));
        db.execute_batch(&self.content)
            .map_err(|e| format!("{} {} failed: {e}", self.kind, self.path.display()))
    }
}

/// Drives one database from its current version to a target version
pub struct Deployer<'a> {
    db: &'a dyn Backend,
    layout: ChangeLayout,
    journal: Journal<'a>,
    options: DeployOptions,
    extractor: Box<dyn TableExtractor + 'a>,
}

impl<'a> Deployer<'a> {
    /// Deployer using a keyword scanner scoped to the backend's namespaces
    pub fn new(
        db: &'a dyn Backend,
        layout: ChangeLayout,
        journal: Journal<'a>,
    ) -> EngineResult<Self> {
        let extractor = KeywordScanner::with_namespaces(db.active_namespaces()?);
        Ok(Self {
            db,
            layout,
            journal,
            options: DeployOptions::default(),
            extractor: Box::new(extractor),
        })
    }

    pub fn with_options(mut self, options: DeployOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_extractor(mut self, extractor: impl TableExtractor + 'a) -> Self {
        self.extractor = Box::new(extractor);
        self
    }

    pub fn layout(&self) -> &ChangeLayout {
        &self.layout
    }

    /// Bring the database to `target` (default: highest possible version).
    ///
    /// Load and configuration problems are returned as errors before the
    /// database is touched. Execution failures are reported through
    /// [`DeployOutcome::Failed`].
    pub fn deploy(
        &self,
        target: Option<Version>,
        mode: DeployMode,
    ) -> EngineResult<DeployReport> {
        let highest_possible = self.layout.highest_possible_version()?;
        let target = target.unwrap_or(highest_possible);
        if target > highest_possible {
            return Err(EngineError::VersionOutOfRange {
                target: target.number(),
                highest_possible: highest_possible.number(),
            });
        }

        let prescript = self.load_hook("prescript", self.options.prescript.as_deref())?;
        let postscript = self.load_hook("postscript", self.options.postscript.as_deref())?;

        if !mode.is_mutating() {
            return self.validate_only(target);
        }

        let store = StateStore::new(self.db);
        let (stored, needs_bootstrap) = match store.read() {
            Ok(stored) => (stored, false),
            Err(EngineError::NotInitialized(reason)) => {
                log::debug!("State not readable, bootstrap required: {reason}");
                (StoredState::default(), true)
            }
            Err(e) => return Err(e),
        };
        let state = VersionState::new(
            stored.current_version,
            stored.highest_version,
            highest_possible,
        );
        let current = state.current_version;
        let plan = DeployPlan::between(current, target);
        log::debug!("Deploy plan from {current} to {target}: {plan:?}");

        let units = plan
            .versions()
            .into_iter()
            .map(|v| self.load_unit(v))
            .collect::<EngineResult<Vec<_>>>()?;

        let ctx = self.run_context();
        if needs_bootstrap {
            self.bootstrap(&ctx)?;
        }
        self.journal.progress(format!(
            "Deploying {} from {current} to {target} ({})",
            self.layout.root().display(),
            plan.direction()
        ));

        let report = |outcome: DeployOutcome| DeployReport {
            from: Some(current),
            to: target,
            direction: plan.direction(),
            mode,
            outcome,
        };

        if let Some(hook) = &prescript {
            if let Err(reason) = hook.run(&self.journal, self.db) {
                return Ok(report(DeployOutcome::Failed {
                    version: None,
                    reason,
                }));
            }
        }

        if let Some(failed) = self.traverse(&ctx, &plan, &units) {
            self.journal
                .progress(format!("Deployment to {target} failed at {failed}"));
            return Ok(report(DeployOutcome::Failed {
                version: Some(failed),
                reason: format!("{failed} failed, state left at {current}"),
            }));
        }

        if let Some(hook) = &postscript {
            if let Err(reason) = hook.run(&self.journal, self.db) {
                return Ok(report(DeployOutcome::Failed {
                    version: None,
                    reason,
                }));
            }
        }

        let highest = state.highest_version.max(target);
        store.write(target, highest)?;
        self.journal
            .progress(format!("Database is at {target} (highest {highest})"));
        Ok(report(DeployOutcome::Deployed))
    }

    /// Read-only status; never bootstraps
    pub fn status(&self) -> EngineResult<StatusReport> {
        let highest_possible_version = self.layout.highest_possible_version()?;
        let (initialized, stored) = match StateStore::new(self.db).read() {
            Ok(stored) => (true, Some(stored)),
            Err(EngineError::NotInitialized(_)) => (false, None),
            Err(e) => return Err(e),
        };
        Ok(StatusReport {
            initialized,
            current_version: stored.map(|s| s.current_version),
            highest_version: stored.map(|s| s.highest_version),
            highest_possible_version,
            ledger: Ledger::new(self.db).summary()?,
        })
    }

    /// Visit every unit of the plan; returns the first failing version
    fn traverse(
        &self,
        ctx: &RunContext<'_>,
        plan: &DeployPlan,
        units: &[VersionUnit],
    ) -> Option<Version> {
        let rolling_back = plan.direction() == Direction::Backward;
        units
            .iter()
            .find(|unit| {
                let ok = if rolling_back {
                    unit.rollback(ctx)
                } else {
                    unit.deploy(ctx)
                };
                !ok
            })
            .map(VersionUnit::version)
    }

    fn validate_only(&self, target: Version) -> EngineResult<DeployReport> {
        let unit = self.load_unit(target)?;
        let from = match StateStore::new(self.db).read() {
            Ok(stored) => Some(stored.current_version),
            Err(EngineError::NotInitialized(_)) => None,
            Err(e) => return Err(e),
        };
        self.journal.progress(format!(
            "{target} is valid ({} scripts)",
            unit.scripts().len()
        ));
        Ok(DeployReport {
            from,
            to: target,
            direction: from.map_or(Direction::Forward, |c| {
                DeployPlan::between(c, target).direction()
            }),
            mode: DeployMode::Validate,
            outcome: DeployOutcome::Validated,
        })
    }

    /// Create the bookkeeping tables by deploying version 0, once.
    ///
    /// State that is still unreadable afterwards is fatal.
    fn bootstrap(&self, ctx: &RunContext<'_>) -> EngineResult<()> {
        self.journal.progress("First-time initialization");
        let unit = self.load_unit(Version::ZERO)?;
        if !unit.deploy(ctx) {
            return Err(EngineError::NotInitialized(
                "deploying v0 did not succeed".to_string(),
            ));
        }
        let store = StateStore::new(self.db);
        store.write(Version::ZERO, Version::ZERO)?;
        store.read()?;
        Ok(())
    }

    /// Load one version; an empty v0 falls back to the built-in bootstrap
    /// scripts
    fn load_unit(&self, version: Version) -> EngineResult<VersionUnit> {
        let unit = VersionUnit::load(&self.layout, version, self.db, self.extractor.as_ref())?;
        if !version.is_zero() || !unit.is_empty() {
            return Ok(unit);
        }
        let scripts = BOOTSTRAP_SCRIPTS
            .iter()
            .map(|(name, sql)| {
                ChangeScript::new(version, *name, *sql, self.db, self.extractor.as_ref())
            })
            .collect::<EngineResult<Vec<_>>>()?;
        Ok(VersionUnit::from_scripts(version, scripts))
    }

    fn load_hook(
        &self,
        kind: &'static str,
        path: Option<&Path>,
    ) -> EngineResult<Option<HookScript>> {
        path.map(|p| HookScript::load(kind, p, self.db)).transpose()
    }

    fn run_context(&self) -> RunContext<'_> {
        let limits = SnapshotLimits::new(&self.options.snapshot, self.db.max_packet_size());
        RunContext::new(self.db, &self.journal, SnapshotGenerator::new(limits))
    }
}

#[cfg(test)]
#[path = "deployer_test.rs"]
mod tests;
