//! Error types for the Loreweaver knowledge base.
//!
//! This module defines a unified error enum that covers all error categories
//! in the library: configuration, I/O, embedding backends, knowledge base
//! operations and serialization.

use thiserror::Error;

/// Unified error type for the Loreweaver library.
///
/// All fallible internal functions return `Result<T, AppError>`.
/// We never panic — errors must be represented and propagated, and the
/// `KnowledgeBase` public boundary converts them into result-level
/// failures (messages, booleans, empty sequences).
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Embedding backend errors (initialization or encoding)
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Knowledge base and vector index errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic errors
    #[error("{0}")]
    Other(String),
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
