//! Error handling module
//!
//! Provides the error types for the schema model and the migration pipeline.

use crate::config::ConfigError;
use std::path::PathBuf;
use thiserror::Error;

/// Structural contract violations in schema snapshot values.
///
/// The diff engine refuses to run on a snapshot that fails validation
/// instead of emitting actions built on a malformed spec.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaError {
    #[error("Invalid column type: '{0}'")]
    InvalidType(String),

    #[error("Table registered as '{key}' is named '{name}'")]
    TableKeyMismatch { key: String, name: String },

    #[error("Column registered as '{table}.{key}' is named '{name}'")]
    ColumnKeyMismatch {
        table: String,
        key: String,
        name: String,
    },

    #[error("Index registered as '{table}.{key}' is named '{name}'")]
    IndexKeyMismatch {
        table: String,
        key: String,
        name: String,
    },

    #[error("Column {table}.{column} is auto-increment but has non-integer type {data_type}")]
    AutoIncrementNotInteger {
        table: String,
        column: String,
        data_type: String,
    },

    #[error("Index {table}.{index} has no columns")]
    EmptyIndex { table: String, index: String },

    #[error("Index {table}.{index} references unknown column '{column}'")]
    UnknownIndexColumn {
        table: String,
        index: String,
        column: String,
    },
}

/// Pipeline-wide error type
#[derive(Error, Debug)]
pub enum MigrateError {
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("Failed to extract models: {0}")]
    Extract(String),

    #[error("Database error: {0}")]
    Database(#[from] tokio_postgres::Error),

    #[error("Pool error: {0}")]
    Pool(#[from] deadpool_postgres::PoolError),

    #[error("State store error: {0}")]
    StateStore(String),

    #[error("{} does not exist. Check the migrations path", .0.display())]
    OutputDirMissing(PathBuf),

    #[error("Failed to write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),
}

impl MigrateError {
    /// Stable code identifying the failing collaborator
    pub fn code(&self) -> &'static str {
        match self {
            MigrateError::Schema(_) => "SCHEMA_ERROR",
            MigrateError::Extract(_) => "EXTRACT_ERROR",
            MigrateError::Database(_) => "DATABASE_ERROR",
            MigrateError::Pool(_) => "POOL_EXHAUSTED",
            MigrateError::StateStore(_) => "STATE_STORE_ERROR",
            MigrateError::OutputDirMissing(_) => "OUTPUT_DIR_MISSING",
            MigrateError::Write { .. } => "WRITE_ERROR",
            MigrateError::Serialization(_) => "SERIALIZATION_ERROR",
            MigrateError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the failure came from the state store (database or pool)
    pub fn is_state_store(&self) -> bool {
        matches!(
            self,
            MigrateError::Database(_) | MigrateError::Pool(_) | MigrateError::StateStore(_)
        )
    }
}

/// Result type alias for pipeline operations
pub type MigrateResult<T> = Result<T, MigrateError>;

/// Helper function to create an extraction error
pub fn extract_error(msg: impl Into<String>) -> MigrateError {
    MigrateError::Extract(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes_are_distinct_per_collaborator() {
        let errors = [
            extract_error("bad model"),
            MigrateError::StateStore("down".into()),
            MigrateError::OutputDirMissing(PathBuf::from("migrations")),
            MigrateError::Schema(SchemaError::InvalidType(String::new())),
        ];
        let codes: Vec<_> = errors.iter().map(MigrateError::code).collect();
        assert_eq!(
            codes,
            ["EXTRACT_ERROR", "STATE_STORE_ERROR", "OUTPUT_DIR_MISSING", "SCHEMA_ERROR"]
        );
        assert!(errors[1].is_state_store());
        assert!(!errors[0].is_state_store());
    }

    #[test]
    fn test_output_dir_message_names_path() {
        let err = MigrateError::OutputDirMissing(PathBuf::from("db/migrations"));
        assert!(err.to_string().starts_with("db/migrations does not exist"));
    }
}
