//! Execution service configuration.

use std::time::Duration;

use routescope_core::DEFAULT_CACHE_CAPACITY;
use routescope_proto::Find;

/// Default table holding route rows.
pub const DEFAULT_ROUTES_TABLE: &str = "routes";

/// Default table holding stop rows.
pub const DEFAULT_STOPS_TABLE: &str = "stops";

/// Execution service configuration.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Maximum number of cached compiled queries.
    pub cache_capacity: usize,

    /// Limit on the engine query round trip. `None` waits indefinitely.
    pub execution_timeout: Option<Duration>,

    /// Table queried for `find = routes`.
    pub routes_table: String,

    /// Table queried for `find = stops`.
    pub stops_table: String,
}

impl ServiceConfig {
    /// Create a configuration with default settings.
    pub fn new() -> Self {
        Self {
            cache_capacity: DEFAULT_CACHE_CAPACITY,
            execution_timeout: None,
            routes_table: DEFAULT_ROUTES_TABLE.to_string(),
            stops_table: DEFAULT_STOPS_TABLE.to_string(),
        }
    }

    /// Set the compiled-query cache capacity.
    pub fn with_cache_capacity(mut self, capacity: usize) -> Self {
        self.cache_capacity = capacity;
        self
    }

    /// Set the engine round-trip timeout.
    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }

    /// Set the routes table name.
    pub fn with_routes_table(mut self, table: impl Into<String>) -> Self {
        self.routes_table = table.into();
        self
    }

    /// Set the stops table name.
    pub fn with_stops_table(mut self, table: impl Into<String>) -> Self {
        self.stops_table = table.into();
        self
    }

    /// Table to query for a `find` target.
    pub fn table_for(&self, find: Find) -> &str {
        match find {
            Find::Routes => &self.routes_table,
            Find::Stops => &self.stops_table,
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self::new()
    }
}
