//! Error types for the basketrec recommendation service
//!
//! This module provides comprehensive error handling using thiserror for
//! structured error definitions and anyhow for error propagation.

use thiserror::Error;

/// Main error type for basketrec operations
#[derive(Error, Debug)]
pub enum RecommendError {
    /// Database operation failed
    #[error("Database error: {0}")]
    Database(String),

    /// Identifier did not match the expected format
    #[error("Invalid id: {0}")]
    InvalidId(String),

    /// Event type outside the tracked set
    #[error("Invalid event type: {0}")]
    InvalidEventType(String),

    /// User not found
    #[error("User not found: {0}")]
    UserNotFound(String),

    /// Product not found
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// No event matched a removal request
    #[error("Event not found")]
    EventNotFound,

    /// Model training or inference failed
    #[error("Model error: {0}")]
    Model(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Model artifact could not be encoded or decoded
    #[error("Artifact error: {0}")]
    Artifact(#[from] bincode::Error),

    /// Invalid operation (e.g., malformed request body)
    #[error("Invalid operation: {0}")]
    InvalidOperation(String),

    /// Generic error with context
    #[error("{0}")]
    Other(String),
}

impl RecommendError {
    /// True when the error was caused by caller input rather than the service
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            RecommendError::InvalidId(_)
                | RecommendError::InvalidEventType(_)
                | RecommendError::InvalidOperation(_)
        )
    }

    /// True when the error reports a missing entity
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            RecommendError::UserNotFound(_)
                | RecommendError::ProductNotFound(_)
                | RecommendError::EventNotFound
        )
    }
}

/// Result type alias for basketrec operations
pub type Result<T> = std::result::Result<T, RecommendError>;

/// Convert anyhow::Error to RecommendError
impl From<anyhow::Error> for RecommendError {
    fn from(err: anyhow::Error) -> Self {
        RecommendError::Other(err.to_string())
    }
}

impl From<rusqlite::Error> for RecommendError {
    fn from(err: rusqlite::Error) -> Self {
        RecommendError::Database(err.to_string())
    }
}
