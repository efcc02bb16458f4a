//! Error types for Sift.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, embedding/search providers, the
//! knowledge store, input validation and serialization.

use thiserror::Error;

/// Unified error type for Sift.
///
/// All fallible functions return `Result<T, AppError>`.
/// We never panic; errors must be represented and propagated.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding provider or search backend failures (quota, timeout, network)
    #[error("Provider error: {0}")]
    Provider(String),

    /// Knowledge store and index errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Input that cannot be repaired by clamping (e.g. an empty query)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
}

impl AppError {
    /// Whether this error came from an external collaborator and should be
    /// recovered into the workflow's error state rather than propagated.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, AppError::Provider(_) | AppError::Knowledge(_))
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

impl From<serde_yaml::Error> for AppError {
    fn from(err: serde_yaml::Error) -> Self {
        AppError::Serialization(err.to_string())
    }
}

/// Convenience type alias for Results with AppError.
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_category() {
        let err = AppError::Provider("quota exceeded".to_string());
        assert_eq!(err.to_string(), "Provider error: quota exceeded");
    }

    #[test]
    fn test_recoverable_categories() {
        assert!(AppError::Provider("x".into()).is_recoverable());
        assert!(AppError::Knowledge("x".into()).is_recoverable());
        assert!(!AppError::Validation("x".into()).is_recoverable());
        assert!(!AppError::Config("x".into()).is_recoverable());
    }

    #[test]
    fn test_from_serde_json() {
        let err: AppError = serde_json::from_str::<u32>("nope").unwrap_err().into();
        assert!(matches!(err, AppError::Serialization(_)));
    }
}
