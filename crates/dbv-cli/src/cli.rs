//! CLI argument definitions using clap derive API

use clap::{Args, Parser, Subcommand, ValueEnum};
use dbv_core::DeployMode;

/// dbv - versioned schema migrations with backup-driven rollback
#[derive(Parser, Debug)]
#[command(name = "dbv")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Global options
    #[command(flatten)]
    pub global: GlobalArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Global arguments available to all commands
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to the configuration file
    #[arg(short, long, global = true, default_value = "dbv.yml", env = "DBV_CONFIG")]
    pub config: String,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Bring the database to a version
    Deploy(DeployArgs),

    /// Show current, highest and highest possible versions
    Status(StatusArgs),

    /// Scaffold dbv.yml and the version 0 bootstrap scripts
    Init(InitArgs),
}

/// Arguments for the deploy command
#[derive(Args, Debug)]
pub struct DeployArgs {
    /// Target version (default: highest version on disk)
    #[arg(long = "version", value_name = "N")]
    pub target: Option<u32>,

    /// Deployment mode
    #[arg(short, long, value_enum, default_value = "integrity")]
    pub mode: ModeArg,
}

/// Deployment modes accepted on the command line
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModeArg {
    /// Back up, execute, roll back on failure
    Integrity,
    /// Load and validate the target version only
    Validate,
}

impl From<ModeArg> for DeployMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Integrity => DeployMode::Integrity,
            ModeArg::Validate => DeployMode::Validate,
        }
    }
}

/// Arguments for the status command
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub output: StatusOutput,
}

/// Status output formats
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusOutput {
    /// Human-readable table
    Table,
    /// JSON document
    Json,
}

/// Arguments for the init command
#[derive(Args, Debug)]
pub struct InitArgs {
    /// Directory to initialize
    #[arg(default_value = ".")]
    pub dir: String,

    /// Database path written into dbv.yml
    #[arg(long, default_value = "dbv.duckdb")]
    pub database_path: String,
}

#[cfg(test)]
#[path = "cli_test.rs"]
mod tests;
