//! Error types for Sage.
//!
//! This module defines a unified error enum that covers all error categories
//! in the application: configuration, I/O, generation, knowledge base,
//! prompts, retrieval and the workflow itself.

use thiserror::Error;

/// Unified error type for Sage.
///
/// Library functions return `Result<T, AppError>`. Pipeline stages absorb
/// these errors into degraded state values; only the CLI surfaces them.
#[derive(Error, Debug)]
pub enum AppError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O and filesystem errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Text generation provider errors
    #[error("LLM error: {0}")]
    Llm(String),

    /// Knowledge base, ingestion and index errors
    #[error("Knowledge error: {0}")]
    Knowledge(String),

    /// Prompt system errors
    #[error("Prompt error: {0}")]
    Prompt(String),

    /// Similarity search errors
    #[error("Retrieval error: {0}")]
    Retrieval(String),

    /// Workflow construction or execution errors
    #[error("Workflow error: {0}")]
    Workflow(String),

    /// Rejected user input
    #[error("Invalid input: {0}")]
    Validation(String),

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
