//! Error types for the dispatcher core.

use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DispatcherError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Configuration error: {0}")]
    ConfigurationError(String),
    #[error("Invalid state: {0}")]
    InvalidState(String),
    #[error("Lock error: {0}")]
    LockError(String),
    #[error("Validation error: {0}")]
    ValidationError(String),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DispatcherError {
    /// Errors that must stop the reclamation loop instead of being logged and skipped.
    ///
    /// A misconfigured retention window or a sweep started inside a transaction are
    /// deployment or programming mistakes; retrying on the next tick would only hide them.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            DispatcherError::ConfigurationError(_) | DispatcherError::InvalidState(_)
        )
    }
}

impl From<sqlx::Error> for DispatcherError {
    fn from(err: sqlx::Error) -> Self {
        DispatcherError::DatabaseError(err.to_string())
    }
}

impl From<sqlx::migrate::MigrateError> for DispatcherError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        DispatcherError::DatabaseError(format!("Migration failed: {err}"))
    }
}

impl From<serde_json::Error> for DispatcherError {
    fn from(error: serde_json::Error) -> Self {
        DispatcherError::ValidationError(format!("JSON serialization error: {error}"))
    }
}

impl From<crate::config::ConfigurationError> for DispatcherError {
    fn from(error: crate::config::ConfigurationError) -> Self {
        DispatcherError::ConfigurationError(error.to_string())
    }
}

impl From<config::ConfigError> for DispatcherError {
    fn from(error: config::ConfigError) -> Self {
        DispatcherError::ConfigurationError(error.to_string())
    }
}

pub type DispatcherResult<T> = std::result::Result<T, DispatcherError>;
