//! routescope protocol types.
//!
//! This crate defines the value types shared by the validator, compiler,
//! predicate builder and execution service. Every type here is plain data
//! and derives serde's `Serialize`/`Deserialize`, so the query model and the
//! compiled-query contract can be exchanged as JSON.
//!
//! # Modules
//!
//! - [`query`] - The declarative query model (`SpatialQuery`, `Block`)
//! - [`context`] - Per-call capability snapshot (`ExecutionContext`)
//! - [`compiled`] - The versioned compiled-query contract
//! - [`result`] - The result contract returned by the execution service
//! - [`error`] - Protocol error types
//!
//! # Example
//!
//! ```rust
//! use routescope_proto::{Condition, SpatialQuery};
//!
//! let query = SpatialQuery::new().with_condition(Condition::Within).with_distance(500.0);
//! let value = query.to_value().unwrap();
//! assert_eq!(SpatialQuery::from_value(value).unwrap(), query);
//! ```

pub mod compiled;
pub mod context;
pub mod error;
pub mod query;
pub mod result;

pub use error::Error;

pub use compiled::{
    ClauseKind, CompileMetadata, CompiledBlock, CompiledQuery, ContextSnapshot, MainClause,
    Relation, SupplementalClause,
};
pub use context::{BboxFields, Boundary, ExecutionContext, LatLng};
pub use query::{Block, BlockOperator, BlockType, Condition, Find, SpatialQuery, Target};
pub use result::QueryResult;

/// Version of the compiled-query contract.
///
/// Consumers compare this against the version they understand; bump the
/// major component on any incompatible change to `CompiledQuery`.
pub const CONTRACT_VERSION: &str = "1.0.0";

/// Meters per degree of latitude, used for every radius-to-degree conversion.
pub const METERS_PER_DEGREE: f64 = 111_320.0;
