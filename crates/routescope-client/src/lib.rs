//! routescope client - execution service and query engines.
//!
//! # Quick Start
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use routescope_client::{ExecutionService, MemoryEngine};
//! use routescope_proto::{BboxFields, Condition, ExecutionContext, SpatialQuery};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = MemoryEngine::new();
//!     let data: serde_json::Value = serde_json::from_str(&std::fs::read_to_string("routes.geojson")?)?;
//!     engine.load_geojson("routes", &data, "geometry", &BboxFields::default())?;
//!
//!     let service = ExecutionService::with_engine(Arc::new(engine));
//!     let ctx = ExecutionContext::new()
//!         .with_service_id_field("service_id")
//!         .with_bbox_fields(BboxFields::default())
//!         .with_geojson_field("geometry")
//!         .with_point(55.9533, -3.1883);
//!
//!     let result = service
//!         .execute_query(&SpatialQuery::new().with_condition(Condition::Within), &ctx)
//!         .await;
//!     println!("{} routes", result.count.unwrap_or(0));
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod memory;
pub mod service;
#[cfg(feature = "sqlite")]
pub mod sqlite;

pub use config::ServiceConfig;
pub use engine::{EngineConnection, EngineQuery, QueryEngine};
pub use error::Error;
pub use memory::MemoryEngine;
pub use service::{CancellationToken, ExecutionPhase, ExecutionPlan, ExecutionService};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteEngine;

/// Re-export protocol types.
pub use routescope_proto as proto;
