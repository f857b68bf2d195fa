//! A single change script.

use crate::context::RunContext;
use crate::error::{EngineError, EngineResult};
use crate::journal::{LogRecord, ScriptStatus};
use dbv_core::{compute_checksum, ScriptFile, Version};
use dbv_db::Backend;
use dbv_sql::TableExtractor;
use std::collections::BTreeSet;
use std::time::{Duration, Instant};

/// Result of running one script
#[derive(Debug, Clone, PartialEq)]
pub struct ScriptOutcome {
    pub status: ScriptStatus,
    pub message: String,
    pub elapsed: Duration,
}

impl ScriptOutcome {
    pub fn succeeded(&self) -> bool {
        self.status != ScriptStatus::Failed
    }
}

/// One validated SQL unit of a version.
///
/// Construction rejects scripts that fail the syntax check or reference no
/// table at all; once built, a script is immutable.
#[derive(Debug, Clone)]
pub struct ChangeScript {
    version: Version,
    name: String,
    content: String,
    fingerprint: String,
    affected_tables: BTreeSet<String>,
}

impl ChangeScript {
    pub fn new(
        version: Version,
        name: impl Into<String>,
        content: impl Into<String>,
        db: &dyn Backend,
        extractor: &dyn TableExtractor,
    ) -> EngineResult<Self> {
        let name = name.into();
        let content = content.into();
        let reject = |reason: String| EngineError::Script {
            version: version.to_string(),
            name: name.clone(),
            reason,
        };

        db.validate(&content).map_err(|e| reject(e.to_string()))?;
        let affected_tables = extractor.impacted_tables(&content);
        if affected_tables.is_empty() {
            return Err(reject("no tables detected".to_string()));
        }

        let fingerprint = compute_checksum(&content);
        Ok(Self {
            version,
            name,
            content,
            fingerprint,
            affected_tables,
        })
    }

    /// Load a script file of `version`
    pub fn from_file(
        version: Version,
        file: &ScriptFile,
        db: &dyn Backend,
        extractor: &dyn TableExtractor,
    ) -> EngineResult<Self> {
        let content = file.read()?;
        Self::new(version, file.name.clone(), content, db, extractor)
    }

    pub fn version(&self) -> Version {
        self.version
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn affected_tables(&self) -> &BTreeSet<String> {
        &self.affected_tables
    }

    /// Whether the ledger already holds this exact content for this version
    pub fn is_applied(&self, ctx: &RunContext<'_>) -> EngineResult<bool> {
        ctx.ledger
            .already_applied(self.version, &self.name, &self.fingerprint)
    }

    /// Run the script at most once and journal the outcome.
    ///
    /// Never fails: backend errors become a `FAILED` outcome.
    pub fn run(&self, ctx: &RunContext<'_>) -> ScriptOutcome {
        let started = Instant::now();
        let (status, message) = match self.is_applied(ctx) {
            Ok(true) => (ScriptStatus::Skipped, "already applied".to_string()),
            Ok(false) => match ctx.db.execute_batch(&self.content) {
                Ok(()) => match ctx.ledger.record(
                    self.version,
                    &self.name,
                    &self.fingerprint,
                    &self.content,
                ) {
                    Ok(_) => (ScriptStatus::Ok, String::new()),
                    Err(e) => (
                        ScriptStatus::Failed,
                        format!("executed but not recorded: {e}"),
                    ),
                },
                Err(e) => (ScriptStatus::Failed, e.to_string()),
            },
            Err(e) => (ScriptStatus::Failed, format!("ledger lookup failed: {e}")),
        };
        let elapsed = started.elapsed();

        ctx.journal.record(&LogRecord {
            version: self.version,
            name: self.name.clone(),
            status,
            message: message.clone(),
            execution_time: elapsed,
        });

        ScriptOutcome {
            status,
            message,
            elapsed,
        }
    }

    /// [`ChangeScript::run`] reduced to success or failure
    pub fn execute(&self, ctx: &RunContext<'_>) -> bool {
        self.run(ctx).succeeded()
    }
}

#[cfg(test)]
#[path = "change_script_test.rs"]
mod tests;
