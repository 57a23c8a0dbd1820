//! Core error types.

use thiserror::Error;

/// Errors raised while building or evaluating predicates.
#[derive(Debug, Error)]
pub enum Error {
    /// The context cannot express the requested clause.
    #[error("capability error: {0}")]
    Capability(String),

    /// A point clause was requested without a selected point.
    #[error("a selected point is required for {0}")]
    MissingPoint(String),

    /// A boundary clause was requested without a boundary geometry.
    #[error("a boundary geometry is required for {0}")]
    MissingBoundary(String),

    /// The geometry type has no supported conversion.
    #[error("unsupported geometry type: {0}")]
    UnsupportedGeometry(String),

    /// The geometry could not be parsed.
    #[error("invalid geometry: {0}")]
    InvalidGeometry(String),

    /// Bbox tier selected without bbox column names.
    #[error("bbox tier selected but bbox fields are not configured")]
    MissingBboxFields,

    /// An attribute clause names a column the context does not map.
    #[error("no column configured for attribute '{0}'")]
    MissingField(String),

    /// The compiled query is structurally unusable.
    #[error("malformed compiled query: {0}")]
    MalformedQuery(String),

    /// In-memory evaluation cannot decide this predicate.
    #[error("evaluation error: {0}")]
    Evaluation(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, Error>;
