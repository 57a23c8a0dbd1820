//! Error types for validation and compilation.

use thiserror::Error;

/// A query violates one or more invariants for the given context.
///
/// Every violation is collected; nothing is reported fail-fast.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid query: {}", .messages.join("; "))]
pub struct ValidationError {
    /// One message per violation, in check order.
    pub messages: Vec<String>,
}

impl ValidationError {
    /// Create from a non-empty list of violations.
    pub fn new(messages: Vec<String>) -> Self {
        Self { messages }
    }
}

/// Error during compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// The query failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The logical query could not be encoded for hashing.
    #[error("hash error: {0}")]
    Hash(String),
}

impl CompileError {
    /// Validation messages, if this is a validation failure.
    pub fn violations(&self) -> Option<&[String]> {
        match self {
            CompileError::Validation(v) => Some(&v.messages),
            CompileError::Hash(_) => None,
        }
    }
}
