//! Configuration types and parsing for dbv.yml

use crate::error::{CoreError, CoreResult};
use crate::layout::ChangeLayout;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Config file names probed by [`Config::load_from_dir`], in order
pub const CONFIG_FILE_NAMES: &[&str] = &["dbv.yml", "dbv.yaml", "dbv.json"];

/// In-memory database path marker
pub const MEMORY_DB_PATH: &str = ":memory:";

/// Main configuration from dbv.yml
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Database connection configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Location of the version directories
    #[serde(default)]
    pub changes: ChangesConfig,

    /// SQL file executed before every deployment
    #[serde(default)]
    pub prescript: Option<String>,

    /// SQL file executed after every successful deployment
    #[serde(default)]
    pub postscript: Option<String>,

    /// Backup chunking limits
    #[serde(default)]
    pub snapshot: SnapshotConfig,

    /// Directory relative paths are resolved against
    #[serde(skip)]
    base_dir: PathBuf,
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DatabaseConfig {
    /// DuckDB file path, or `:memory:`
    #[serde(default = "default_db_path")]
    pub path: String,

    /// Largest statement the connection accepts, in bytes
    #[serde(default)]
    pub max_packet_bytes: Option<usize>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_packet_bytes: None,
        }
    }
}

/// Location of the change scripts
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ChangesConfig {
    /// Root directory holding `v<N>` directories
    #[serde(default = "default_changes_src")]
    pub src: String,
}

impl Default for ChangesConfig {
    fn default() -> Self {
        Self {
            src: default_changes_src(),
        }
    }
}

/// Limits applied when table contents are dumped into backup chunks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SnapshotConfig {
    /// An INSERT chunk is flushed once it reaches this many bytes
    #[serde(default = "default_split_bytes")]
    pub split_bytes: usize,

    /// Per-row allowance added when projecting a chunk's final size
    #[serde(default = "default_row_overhead_bytes")]
    pub row_overhead_bytes: usize,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            split_bytes: default_split_bytes(),
            row_overhead_bytes: default_row_overhead_bytes(),
        }
    }
}

fn default_db_path() -> String {
    "dbv.duckdb".to_string()
}

fn default_changes_src() -> String {
    "changes".to_string()
}

fn default_split_bytes() -> usize {
    250_000
}

fn default_row_overhead_bytes() -> usize {
    64
}

impl Config {
    /// Load configuration from a file path.
    ///
    /// Relative paths inside the file resolve against the file's directory.
    pub fn load(path: &Path) -> CoreResult<Self> {
        if !path.exists() {
            return Err(CoreError::ConfigNotFound {
                path: path.display().to_string(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CoreError::IoWithPath {
            path: path.display().to_string(),
            source: e,
        })?;
        let base_dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| PathBuf::from("."));
        Self::parse(&content, &base_dir).map_err(|e| match e {
            CoreError::ConfigParseError { message, .. } => CoreError::ConfigParseError {
                path: path.display().to_string(),
                message,
            },
            other => other,
        })
    }

    /// Load configuration from a directory, probing [`CONFIG_FILE_NAMES`]
    pub fn load_from_dir(dir: &Path) -> CoreResult<Self> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|p| p.exists())
            .map_or_else(
                || {
                    Err(CoreError::ConfigNotFound {
                        path: dir.join(CONFIG_FILE_NAMES[0]).display().to_string(),
                    })
                },
                |p| Self::load(&p),
            )
    }

    /// Parse configuration text. JSON is accepted as a YAML subset.
    pub fn parse(content: &str, base_dir: &Path) -> CoreResult<Self> {
        let mut config: Config =
            serde_yaml::from_str(content).map_err(|e| CoreError::ConfigParseError {
                path: "<inline>".to_string(),
                message: e.to_string(),
            })?;
        config.base_dir = base_dir.to_path_buf();
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    fn validate(&self) -> CoreResult<()> {
        if self.database.path.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "database.path cannot be empty".to_string(),
            });
        }
        if self.changes.src.trim().is_empty() {
            return Err(CoreError::ConfigInvalid {
                message: "changes.src cannot be empty".to_string(),
            });
        }
        if self.snapshot.split_bytes == 0 {
            return Err(CoreError::ConfigInvalid {
                message: "snapshot.split_bytes must be greater than zero".to_string(),
            });
        }
        if let Some(max) = self.database.max_packet_bytes {
            if max <= self.snapshot.row_overhead_bytes {
                return Err(CoreError::ConfigInvalid {
                    message: format!(
                        "database.max_packet_bytes ({max}) must exceed snapshot.row_overhead_bytes ({})",
                        self.snapshot.row_overhead_bytes
                    ),
                });
            }
        }
        for (key, value) in [("prescript", &self.prescript), ("postscript", &self.postscript)] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(CoreError::ConfigInvalid {
                    message: format!("{key} cannot be an empty path"),
                });
            }
        }
        Ok(())
    }

    /// Directory relative paths are resolved against
    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    /// Database path to open; `:memory:` is passed through untouched
    pub fn database_path(&self) -> String {
        if self.database.path == MEMORY_DB_PATH {
            return self.database.path.clone();
        }
        self.resolve(&self.database.path).display().to_string()
    }

    /// Absolute (or base-relative) changes root
    pub fn changes_dir(&self) -> PathBuf {
        self.resolve(&self.changes.src)
    }

    /// Layout over [`Config::changes_dir`]
    pub fn layout(&self) -> ChangeLayout {
        ChangeLayout::new(self.changes_dir())
    }

    /// Resolved prescript path, if configured
    pub fn prescript_path(&self) -> Option<PathBuf> {
        self.prescript.as_deref().map(|p| self.resolve(p))
    }

    /// Resolved postscript path, if configured
    pub fn postscript_path(&self) -> Option<PathBuf> {
        self.postscript.as_deref().map(|p| self.resolve(p))
    }

    fn resolve(&self, path: &str) -> PathBuf {
        let p = Path::new(path);
        if p.is_absolute() {
            p.to_path_buf()
        } else {
            self.base_dir.join(p)
        }
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
