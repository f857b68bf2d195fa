//! dbv CLI - versioned schema migrations with backup-driven rollback

use clap::Parser;

mod cli;
mod commands;
mod context;

use cli::Cli;
use commands::common::{ExitCode, EXIT_CONFIG_ERROR};
use commands::{deploy, init, status};

fn main() {
    let cli = Cli::parse();

    let result = match &cli.command {
        cli::Commands::Deploy(args) => deploy::execute(args, &cli.global),
        cli::Commands::Status(args) => status::execute(args, &cli.global),
        cli::Commands::Init(args) => init::execute(args),
    };

    if let Err(err) = result {
        let code = match err.downcast_ref::<ExitCode>() {
            Some(ExitCode(code)) => *code,
            None => {
                eprintln!("Error: {err:#}");
                EXIT_CONFIG_ERROR
            }
        };
        std::process::exit(code);
    }
}
