//! Error types for dbv-core

use thiserror::Error;

/// Core error type for dbv
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Configuration file not found
    #[error("[C001] Config file not found: {path}")]
    ConfigNotFound { path: String },

    /// C002: Failed to parse configuration file
    #[error("[C002] Failed to parse config {path}: {message}")]
    ConfigParseError { path: String, message: String },

    /// C003: Invalid configuration value
    #[error("[C003] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C004: Changes directory missing
    #[error("[C004] Changes directory not found: {path}")]
    ChangesDirNotFound { path: String },

    /// C005: Entry under the changes directory is not a `v<N>` directory
    #[error("[C005] Invalid version directory '{name}' in {path}: expected v<N>")]
    InvalidVersionDir { name: String, path: String },

    /// C006: Script file name does not follow `dbc<N>_<name>.sql`
    #[error("[C006] Invalid change script name '{name}' in {path}: expected dbc<N>_<name>.sql")]
    InvalidScriptName { name: String, path: String },

    /// C007: Two scripts of one version share a numeric id
    #[error("[C007] Duplicate change script id {id} in {version}: '{first}' and '{second}'")]
    DuplicateScriptId {
        version: String,
        id: u32,
        first: String,
        second: String,
    },

    /// C008: IO error with file path context
    #[error("[C008] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
