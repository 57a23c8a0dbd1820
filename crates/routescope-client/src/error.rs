//! Client error types.

use std::time::Duration;

use routescope_proto::QueryResult;
use thiserror::Error;

/// Execution errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A required context binding is missing.
    #[error("context error: {0}")]
    Context(String),

    /// The query violates one or more rules for this context.
    #[error("invalid query: {}", .0.join("; "))]
    Validation(Vec<String>),

    /// Compilation failed for a reason other than validation.
    #[error("compile error: {0}")]
    Compile(String),

    /// Predicate construction failed.
    #[error("predicate error: {0}")]
    Predicate(#[from] routescope_core::Error),

    /// The call's cancellation token was aborted.
    #[error("query cancelled")]
    Cancelled,

    /// The query engine failed.
    #[error("backend error: {0}")]
    Backend(String),

    /// The engine round trip exceeded the configured timeout.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
}

impl Error {
    /// Whether this error reports a cancellation.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// Convert to the failure shape of the result contract.
    ///
    /// Validation failures keep every message in `errors`; everything
    /// else becomes a single `error` string.
    pub fn into_result(self) -> QueryResult {
        match self {
            Error::Validation(errors) => QueryResult::invalid(errors),
            other => QueryResult::failure(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_into_result_shapes() {
        let invalid = Error::Validation(vec!["a".into(), "b".into()]).into_result();
        assert!(!invalid.success);
        assert_eq!(invalid.errors.as_deref(), Some(&["a".to_string(), "b".to_string()][..]));
        assert!(invalid.error.is_none());

        let cancelled = Error::Cancelled.into_result();
        assert!(!cancelled.success);
        assert!(cancelled.error.unwrap().contains("cancelled"));
    }

    #[test]
    fn test_predicate_error_message() {
        let err: Error = routescope_core::Error::MissingBboxFields.into();
        assert!(err.to_string().contains("bbox fields"));
    }
}
