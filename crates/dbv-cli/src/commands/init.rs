//! Init command implementation - scaffolds a dbv changes directory

use anyhow::{Context, Result};
use dbv_core::Version;
use dbv_engine::{write_bootstrap_scripts, BOOTSTRAP_SCRIPTS};
use std::fs;
use std::path::Path;

use crate::cli::InitArgs;

const EXAMPLE_SCRIPT: &str = "dbc1_create_example.sql";

/// Execute the init command
pub(crate) fn execute(args: &InitArgs) -> Result<()> {
    let root = Path::new(&args.dir);
    let config_path = root.join("dbv.yml");
    if config_path.exists() {
        anyhow::bail!(
            "'{}' already exists. Remove it or choose another directory.",
            config_path.display()
        );
    }

    println!("Initializing dbv in {}\n", root.display());

    let changes = root.join("changes");
    let v0 = changes.join(Version::ZERO.dir_name());
    let v1 = changes.join(Version::new(1).dir_name());
    fs::create_dir_all(&v1)
        .with_context(|| format!("Failed to create directory: {}", v1.display()))?;

    // Escape YAML special characters in interpolated values
    let safe_db_path = args.database_path.replace('"', "\\\"");
    let config_content = format!(
        r#"database:
  path: "{safe_db_path}"

changes:
  src: "changes"

# prescript: "hooks/pre.sql"
# postscript: "hooks/post.sql"

# snapshot:
#   split_bytes: 250000
#   row_overhead_bytes: 64
"#
    );
    fs::write(&config_path, config_content).context("Failed to write dbv.yml")?;

    write_bootstrap_scripts(&v0).context("Failed to write version 0 scripts")?;

    let example_sql = r#"-- Example change script: one table, created once
CREATE TABLE example (
    id INTEGER PRIMARY KEY,
    name VARCHAR NOT NULL
);
"#;
    let example_path = v1.join(EXAMPLE_SCRIPT);
    if !example_path.exists() {
        fs::write(&example_path, example_sql).context("Failed to write example change script")?;
    }

    println!("  Created dbv.yml");
    for (name, _) in BOOTSTRAP_SCRIPTS {
        println!("  Created changes/v0/{name}");
    }
    println!("  Created changes/v1/{EXAMPLE_SCRIPT}");
    println!();
    println!("Next steps:");
    println!("  dbv deploy --mode validate   # Check every script loads");
    println!("  dbv deploy                   # Bring the database to the latest version");

    Ok(())
}

#[cfg(test)]
#[path = "init_test.rs"]
mod tests;
