//! Runtime context for CLI commands

use anyhow::{Context, Result};
use dbv_core::Config;
use dbv_db::{Backend, DuckDbBackend};
use std::path::Path;

use crate::cli::GlobalArgs;

/// Loaded configuration and an open database
pub(crate) struct RuntimeContext {
    pub config: Config,
    pub db: DuckDbBackend,
    pub verbose: bool,
}

impl RuntimeContext {
    /// Load the configuration named by the global arguments and connect
    pub(crate) fn new(args: &GlobalArgs) -> Result<Self> {
        let config_path = Path::new(&args.config);
        let config = Config::load(config_path)
            .with_context(|| format!("Failed to load configuration: {}", config_path.display()))?;

        let db_path = config.database_path();
        let mut db = DuckDbBackend::new(&db_path)
            .with_context(|| format!("Failed to open database: {db_path}"))?;
        if let Some(max) = config.database.max_packet_bytes {
            db = db.with_max_packet_size(max);
        }

        let ctx = Self {
            config,
            db,
            verbose: args.verbose,
        };
        ctx.verbose(&format!(
            "Using {} database {db_path}, changes in {}",
            ctx.db.db_type(),
            ctx.config.changes_dir().display()
        ));
        Ok(ctx)
    }

    /// Print verbose output if enabled
    pub(crate) fn verbose(&self, msg: &str) {
        if self.verbose {
            eprintln!("[verbose] {}", msg);
        }
    }
}
