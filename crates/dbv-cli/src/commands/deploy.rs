//! Deploy command implementation

use anyhow::{Context, Result};
use dbv_core::{DeployMode, Version};
use dbv_engine::DeployOutcome;

use crate::cli::{DeployArgs, GlobalArgs};
use crate::commands::common::{build_deployer, ExitCode, EXIT_DEPLOY_FAILED};
use crate::context::RuntimeContext;

/// Execute the deploy command
pub(crate) fn execute(args: &DeployArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let deployer = build_deployer(&ctx)?;
    let mode = DeployMode::from(args.mode);
    let target = args.target.map(Version::new);

    ctx.verbose(&format!(
        "Deploying {} in {mode} mode",
        target.map_or_else(|| "latest version".to_string(), |v| v.to_string())
    ));

    let report = deployer
        .deploy(target, mode)
        .context("Deployment aborted")?;
    log::debug!("Deploy report: {report:?}");

    match &report.outcome {
        DeployOutcome::Deployed => {
            println!("\nDeployed {} ({})", report.to, report.direction);
            Ok(())
        }
        DeployOutcome::Validated => {
            println!("\nValidated {}", report.to);
            Ok(())
        }
        DeployOutcome::Failed { version, reason } => {
            match version {
                Some(v) => eprintln!("\nDeployment failed at {v}: {reason}"),
                None => eprintln!("\nDeployment failed: {reason}"),
            }
            Err(ExitCode(EXIT_DEPLOY_FAILED).into())
        }
    }
}
