//! Error types for relsql-core.
//!
//! Every variant here is a configuration error: the tree or the record
//! metadata handed to the compiler is inconsistent. None of them are retried.

use thiserror::Error;

/// Compilation and metadata error type
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SqlError {
    #[error("Unknown field '{field}' on record '{record}'")]
    UnknownField { record: String, field: String },

    #[error("Record '{0}' is not part of the query")]
    UnknownRecord(String),

    #[error("Invalid clause: {0}")]
    InvalidClause(String),

    #[error("Type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: &'static str, found: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(String),

    #[error("Operation not supported by dialect {dialect}: {what}")]
    Unsupported { dialect: &'static str, what: String },
}

/// Result type for compiler operations
pub type SqlResult<T> = Result<T, SqlError>;

impl SqlError {
    pub fn unknown_field(record: &str, field: &str) -> Self {
        SqlError::UnknownField {
            record: record.to_string(),
            field: field.to_string(),
        }
    }

    pub fn invalid_clause(message: impl Into<String>) -> Self {
        SqlError::InvalidClause(message.into())
    }
}

impl serde::Serialize for SqlError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
