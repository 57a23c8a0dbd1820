//! routescope core - predicate building, geometry and caching.
//!
//! This crate turns a [`CompiledQuery`] plus an [`ExecutionContext`] into a
//! backend-neutral [`Predicate`], and provides the geometry needed to refine
//! approximate bbox matches with exact great-circle distances.

pub mod boundary;
pub mod cache;
pub mod error;
pub mod geometry;
pub mod postfilter;
pub mod predicate;
pub mod row;

pub use boundary::boundary_to_wkt;
pub use cache::{CacheKey, CacheStats, CompiledQueryCache, DEFAULT_CACHE_CAPACITY};
pub use error::{Error, Result};
pub use geometry::{haversine_distance, BBox, EARTH_RADIUS_METERS};
pub use postfilter::{within_distance, PostFilter};
pub use predicate::{
    build_predicate, expand_point_to_bbox, Predicate, PredicateBuilder, PredicateEvaluator,
    SpatialRelation, Tier,
};
pub use row::Row;

pub use routescope_proto::{CompiledQuery, ExecutionContext};

/// Re-export protocol types.
pub use routescope_proto as proto;
