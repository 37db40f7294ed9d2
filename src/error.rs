use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EtlError {
    #[error("Failed to open '{}': {source}", .path.display())]
    FileAccess {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV in '{}': {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("Column '{column}' not found in {table}")]
    MissingColumn { table: String, column: String },

    #[error("Cannot derive category names: {0}")]
    SchemaUnavailable(String),

    #[error("Row {row} has {found} category tokens, expected {expected}")]
    SchemaMismatch {
        row: usize,
        expected: usize,
        found: usize,
    },

    #[error("Row {row}, column '{column}': token '{token}' does not end in a digit")]
    TypeCoercion {
        row: usize,
        column: String,
        token: String,
    },

    #[error("Duplicate column name: {0}")]
    DuplicateColumn(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EtlError>;
