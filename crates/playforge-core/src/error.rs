//! Core error types.

use thiserror::Error;

/// Top-level error type for the coordination core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Malformed input: a bad event payload or a duplicate active rule name.
    #[error("validation error: {0}")]
    Validation(String),

    /// A rule condition failed to evaluate against the given context.
    #[error("evaluation error: {0}")]
    Evaluation(String),

    /// A persistence read or write failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// A handler timed out or failed during event dispatch.
    #[error("delivery error: {0}")]
    Delivery(String),

    /// A requested record does not exist.
    #[error("not found: {0}")]
    NotFound(String),
}
