//! Status command implementation

use anyhow::{Context, Result};
use dbv_engine::{Ledger, StatusReport};

use crate::cli::{GlobalArgs, StatusArgs, StatusOutput};
use crate::commands::common::build_deployer;
use crate::context::RuntimeContext;

/// Execute the status command
pub(crate) fn execute(args: &StatusArgs, global: &GlobalArgs) -> Result<()> {
    let ctx = RuntimeContext::new(global)?;
    let report = build_deployer(&ctx)?
        .status()
        .context("Failed to read version state")?;

    match args.output {
        StatusOutput::Json => println!("{}", serde_json::to_string_pretty(&report)?),
        StatusOutput::Table => {
            print_table(&report);
            if ctx.verbose {
                print_records(&ctx, &report)?;
            }
        }
    }
    Ok(())
}

/// Live ledger records of every version, oldest first
fn print_records(ctx: &RuntimeContext, report: &StatusReport) -> Result<()> {
    let ledger = Ledger::new(&ctx.db);
    for entry in &report.ledger {
        println!("\n{}:", entry.version);
        let records = ledger
            .records(entry.version)
            .with_context(|| format!("Failed to read ledger records of {}", entry.version))?;
        for record in records {
            println!(
                "  {:>6}  {}  {}  {}",
                record.seq,
                record.executed_at,
                &record.fingerprint[..record.fingerprint.len().min(12)],
                record.name
            );
        }
    }
    Ok(())
}

fn print_table(report: &StatusReport) {
    let show = |v: Option<dbv_core::Version>| v.map_or_else(|| "-".to_string(), |v| v.to_string());

    if !report.initialized {
        println!("Database not initialized (run `dbv deploy`)");
    }
    println!("Current version:          {}", show(report.current_version));
    println!("Highest version:          {}", show(report.highest_version));
    println!("Highest possible version: {}", report.highest_possible_version);

    if report.ledger.is_empty() {
        return;
    }
    println!();
    println!("{:<10} {:>8} {:>8}", "VERSION", "SCRIPTS", "BACKUPS");
    for entry in &report.ledger {
        println!(
            "{:<10} {:>8} {:>8}",
            entry.version.to_string(),
            entry.scripts,
            entry.backups
        );
    }
}
