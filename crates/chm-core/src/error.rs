//! Error types for chm-core

use thiserror::Error;

/// Core error type for chm
#[derive(Error, Debug)]
pub enum CoreError {
    /// C001: Required setting is not present in the environment
    #[error("[C001] Environment variable {key} is required{purpose}")]
    ConfigMissing { key: String, purpose: String },

    /// C002: Setting is present but cannot be used
    #[error("[C002] Invalid config: {message}")]
    ConfigInvalid { message: String },

    /// C003: Migrations directory does not exist
    #[error("[C003] Migrations directory not found: {path}")]
    MigrationsDirNotFound { path: String },

    /// C004: Migration file is structurally invalid
    #[error("[C004] Invalid migration {filename}: {reason}")]
    InvalidMigration { filename: String, reason: String },

    /// C005: Name passed to `migration:create` cannot be used in a filename
    #[error("[C005] Invalid migration name '{name}': {reason}")]
    InvalidMigrationName { name: String, reason: String },

    /// C006: IO error with file path context
    #[error("[C006] Failed to read '{path}': {source}")]
    IoWithPath {
        path: String,
        source: std::io::Error,
    },

    /// C007: Project config file could not be parsed
    #[error("[C007] Failed to parse {path}: {source}")]
    ProjectFileParse {
        path: String,
        source: serde_json::Error,
    },
}

impl CoreError {
    /// Shorthand for a missing connection setting.
    pub(crate) fn missing_connection(key: &str) -> Self {
        CoreError::ConfigMissing {
            key: key.to_string(),
            purpose: " to connect to the database".to_string(),
        }
    }
}

/// Result type alias for CoreError
pub type CoreResult<T> = Result<T, CoreError>;
