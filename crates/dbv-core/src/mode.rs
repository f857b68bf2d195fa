//! Deployment modes.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// How a deployment treats the database
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeployMode {
    /// Back up, execute and roll back on failure (default)
    #[default]
    Integrity,
    /// Load and validate the target version without touching the database
    Validate,
}

impl DeployMode {
    /// Whether this mode mutates the database
    pub fn is_mutating(self) -> bool {
        matches!(self, DeployMode::Integrity)
    }
}

impl fmt::Display for DeployMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeployMode::Integrity => write!(f, "integrity"),
            DeployMode::Validate => write!(f, "validate"),
        }
    }
}

impl FromStr for DeployMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "integrity" => Ok(DeployMode::Integrity),
            "validate" => Ok(DeployMode::Validate),
            other => Err(format!(
                "unknown deploy mode '{other}' (expected integrity or validate)"
            )),
        }
    }
}
