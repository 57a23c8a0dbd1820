//! routescope query language front end.
//!
//! This crate validates a [`SpatialQuery`] against the caller's capability
//! snapshot and compiles it into the versioned [`CompiledQuery`] contract
//! consumed by the predicate builder.
//!
//! # Usage
//!
//! ```rust
//! use routescope_lang::{compile_query, validate_query};
//! use routescope_proto::{Condition, ExecutionContext, SpatialQuery};
//!
//! let ctx = ExecutionContext::new()
//!     .with_service_id_field("service_id")
//!     .with_native_geometry("geometry")
//!     .with_point(55.9533, -3.1883);
//! let query = SpatialQuery::new().with_condition(Condition::Within);
//!
//! assert!(validate_query(&query, &ctx).is_empty());
//! let compiled = compile_query(&query, &ctx).unwrap();
//! assert_eq!(compiled.version, "1.0.0");
//! ```

pub mod compiler;
pub mod error;
pub mod hash;
pub mod validator;

pub use compiler::{compile_query, Compiler};
pub use error::{CompileError, ValidationError};
pub use hash::query_hash;
pub use validator::{assert_valid, validate_query};

pub use routescope_proto::{CompiledQuery, ExecutionContext, SpatialQuery};
