use relsql_core::SqlError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PersistError {
    /// Caller asked for something the metadata or settings cannot support
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("SQL error: {0}")]
    Sql(#[from] SqlError),

    #[error("Constraint violation: {message} (sql: {sql})")]
    ConstraintViolation { message: String, sql: String },

    #[error("Driver error: {message} (sql: {sql})")]
    Driver { message: String, sql: String },

    #[error("Config file error: {0}")]
    ConfigFile(#[from] toml::de::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type PersistResult<T> = Result<T, PersistError>;

impl PersistError {
    pub fn configuration(message: impl Into<String>) -> Self {
        PersistError::Configuration(message.into())
    }

    /// Configuration and SQL-shape errors are the caller's fault and never retried
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            PersistError::Configuration(_) | PersistError::Sql(_) | PersistError::ConfigFile(_)
        )
    }

    pub fn is_constraint_violation(&self) -> bool {
        matches!(self, PersistError::ConstraintViolation { .. })
    }
}

impl serde::Serialize for PersistError {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}
