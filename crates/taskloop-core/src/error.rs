//! Unified error types for taskloop

use thiserror::Error;

/// Unified error type for all taskloop operations
#[derive(Error, Debug)]
pub enum TaskloopError {
    // Queue errors
    #[error("Task queue is empty: nothing to execute")]
    EmptyQueue,

    // Backend errors
    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Vector backend error: {0}")]
    Vector(String),

    // Wiring errors
    #[error("State machine error: {0}")]
    StateMachine(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using TaskloopError
pub type Result<T> = std::result::Result<T, TaskloopError>;
