//! Error types for Synheart Proctor

use thiserror::Error;

use crate::schema::ValidationError;

/// Errors surfaced at the boundaries of the engine.
///
/// Classification and debouncing never fail; only acquisition, persistence,
/// parsing and lifecycle misuse produce one of these.
#[derive(Debug, Error)]
pub enum ProctorError {
    #[error("Failed to start monitoring: {0}")]
    AcquisitionFailed(String),

    #[error("Failed to persist report: {0}")]
    PersistenceFailed(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Invalid violation category: {0}")]
    InvalidCategory(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse input: {0}")]
    ParseError(String),

    #[error("Invalid JSON: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Schema validation failed: {0}")]
    Validation(#[from] ValidationError),
}
