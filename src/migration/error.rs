//! Migration-specific error types

use crate::store::StoreError;

/// Migration-specific errors
#[derive(Debug)]
pub enum MigrationError {
    /// Database execution error outside of a migration body
    Database(StoreError),
    /// Migration failed during `up` or `down`
    ExecutionFailed {
        version: i64,
        name: String,
        error: String,
    },
    /// Two registered migrations share a version
    DuplicateVersion(i64),
    /// The state table lists a version no registered migration has
    UnknownApplied { version: i64, name: String },
}

impl std::fmt::Display for MigrationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MigrationError::Database(e) => write!(f, "Database error: {}", e),
            MigrationError::ExecutionFailed { version, name, error } => {
                write!(
                    f,
                    "Migration '{}' (version {}) failed during execution: {}",
                    name, version, error
                )
            }
            MigrationError::DuplicateVersion(version) => {
                write!(f, "More than one migration registered with version {}", version)
            }
            MigrationError::UnknownApplied { version, name } => {
                write!(
                    f,
                    "Applied migration '{}' (version {}) is not registered with this migrator",
                    name, version
                )
            }
        }
    }
}

impl std::error::Error for MigrationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MigrationError::Database(e) => Some(e),
            _ => None,
        }
    }
}

impl From<StoreError> for MigrationError {
    fn from(error: StoreError) -> Self {
        MigrationError::Database(error)
    }
}
