//! Shared utilities for CLI commands

use anyhow::{Context, Result};
use dbv_engine::{Deployer, DeployOptions, Journal};
use std::fmt;

use crate::context::RuntimeContext;

/// Error type representing a non-zero process exit code.
///
/// Use `return Err(ExitCode(N).into())` instead of `std::process::exit(N)`
/// so that destructors (including the database connection) run first.
#[derive(Debug)]
pub(crate) struct ExitCode(pub(crate) i32);

impl fmt::Display for ExitCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Control flow only; nothing to show on stderr.
        write!(f, "")
    }
}

impl std::error::Error for ExitCode {}

/// Exit code for a deployment that ran and failed
pub(crate) const EXIT_DEPLOY_FAILED: i32 = 1;

/// Exit code for configuration and load errors
pub(crate) const EXIT_CONFIG_ERROR: i32 = 2;

/// Deployer over the context's database, layout and options
pub(crate) fn build_deployer(ctx: &RuntimeContext) -> Result<Deployer<'_>> {
    let deployer = Deployer::new(&ctx.db, ctx.config.layout(), Journal::new(&ctx.db))
        .context("Failed to inspect the active database")?
        .with_options(DeployOptions::from_config(&ctx.config));
    Ok(deployer)
}
