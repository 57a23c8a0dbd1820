//! In-memory query engine.
//!
//! Rows live in named tables and are filtered with
//! [`PredicateEvaluator`]. Datasets can be loaded from GeoJSON feature
//! collections, with bbox columns synthesized from each geometry.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::RwLock;
use routescope_core::geometry::parse_geojson;
use routescope_core::{BBox, PredicateEvaluator, Row};
use routescope_proto::BboxFields;
use serde_json::Value;

use crate::engine::{EngineConnection, EngineQuery, QueryEngine};
use crate::error::Error;

type Tables = Arc<RwLock<HashMap<String, Vec<Row>>>>;

/// Engine serving queries from in-memory tables.
#[derive(Default)]
pub struct MemoryEngine {
    tables: Tables,
    connects: Arc<AtomicUsize>,
    closes: Arc<AtomicUsize>,
}

impl MemoryEngine {
    /// Create an engine with no tables.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add rows to a table, creating it if needed.
    pub fn with_table(self, name: impl Into<String>, rows: Vec<Row>) -> Self {
        self.insert_rows(name, rows);
        self
    }

    /// Append rows to a table, creating it if needed.
    pub fn insert_rows(&self, name: impl Into<String>, rows: Vec<Row>) {
        self.tables.write().entry(name.into()).or_default().extend(rows);
    }

    /// Load a GeoJSON `FeatureCollection` into a table.
    ///
    /// Each feature becomes one row: its properties, its geometry object
    /// under `geometry_field`, and bbox columns named by `bbox`. Features
    /// whose geometry cannot be parsed keep their properties but get no
    /// bbox columns. Returns the number of rows loaded.
    pub fn load_geojson(
        &self,
        table: impl Into<String>,
        collection: &Value,
        geometry_field: &str,
        bbox: &BboxFields,
    ) -> Result<usize, Error> {
        let features = collection
            .get("features")
            .and_then(Value::as_array)
            .ok_or_else(|| Error::Backend("GeoJSON input is not a FeatureCollection".into()))?;

        let mut rows = Vec::with_capacity(features.len());
        for feature in features {
            let mut row = feature
                .get("properties")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default();

            if let Some(geometry) = feature.get("geometry").filter(|g| !g.is_null()) {
                match parse_geojson(geometry) {
                    Ok(geom) => {
                        if let Some(b) = BBox::from_geometry(&geom) {
                            insert_bbox(&mut row, bbox, &b);
                        }
                    }
                    Err(e) => tracing::warn!(error = %e, "feature geometry not indexed"),
                }
                row.insert(geometry_field.to_string(), geometry.clone());
            }
            rows.push(row);
        }

        let count = rows.len();
        let table = table.into();
        tracing::debug!(table = %table, rows = count, "loaded GeoJSON features");
        self.insert_rows(table, rows);
        Ok(count)
    }

    /// Number of rows in a table.
    pub fn row_count(&self, table: &str) -> usize {
        self.tables.read().get(table).map_or(0, Vec::len)
    }

    /// Number of `connect()` calls so far.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }

    /// Number of `close()` calls so far.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

fn insert_bbox(row: &mut Row, fields: &BboxFields, b: &BBox) {
    for (name, v) in [
        (&fields.minx, b.minx),
        (&fields.miny, b.miny),
        (&fields.maxx, b.maxx),
        (&fields.maxy, b.maxy),
    ] {
        if let Some(n) = serde_json::Number::from_f64(v) {
            row.insert(name.clone(), Value::Number(n));
        }
    }
}

#[async_trait]
impl QueryEngine for MemoryEngine {
    async fn connect(&self) -> Result<Box<dyn EngineConnection>, Error> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(MemoryConnection {
            tables: Arc::clone(&self.tables),
            closes: Arc::clone(&self.closes),
            closed: false,
        }))
    }
}

/// Connection to a [`MemoryEngine`].
pub struct MemoryConnection {
    tables: Tables,
    closes: Arc<AtomicUsize>,
    closed: bool,
}

#[async_trait]
impl EngineConnection for MemoryConnection {
    async fn query(&mut self, query: &EngineQuery) -> Result<Vec<Row>, Error> {
        if self.closed {
            return Err(Error::Backend("connection is closed".into()));
        }
        let tables = self.tables.read();
        let rows = tables
            .get(&query.table)
            .ok_or_else(|| Error::Backend(format!("no such table: {}", query.table)))?;

        let columns = query.columns();
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in rows {
            let matched = PredicateEvaluator::evaluate(&query.predicate, row)
                .map_err(|e| Error::Backend(e.to_string()))?;
            if !matched {
                continue;
            }
            let projected: Row = columns
                .iter()
                .map(|c| (c.to_string(), row.get(*c).cloned().unwrap_or(Value::Null)))
                .collect();
            // DISTINCT over the projected columns.
            if seen.insert(Value::Object(projected.clone()).to_string()) {
                out.push(projected);
            }
        }
        Ok(out)
    }

    async fn close(&mut self) -> Result<(), Error> {
        if !self.closed {
            self.closed = true;
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use routescope_core::Predicate;
    use serde_json::json;

    fn collection() -> Value {
        json!({
            "type": "FeatureCollection",
            "features": [
                {
                    "type": "Feature",
                    "properties": {"service_id": "R1", "mode": "Bus"},
                    "geometry": {"type": "LineString", "coordinates": [[-3.20, 55.95], [-3.18, 55.96]]}
                },
                {
                    "type": "Feature",
                    "properties": {"service_id": "R2", "mode": "Rail"},
                    "geometry": {"type": "Point", "coordinates": [-3.19, 55.95]}
                },
                {
                    "type": "Feature",
                    "properties": {"service_id": "R3", "mode": "Bus"},
                    "geometry": null
                }
            ]
        })
    }

    #[test]
    fn test_load_geojson_synthesizes_bbox() {
        let engine = MemoryEngine::new();
        let n = engine
            .load_geojson("routes", &collection(), "geometry", &BboxFields::default())
            .unwrap();
        assert_eq!(n, 3);
        assert_eq!(engine.row_count("routes"), 3);

        let tables = engine.tables.read();
        let first = &tables["routes"][0];
        assert_eq!(first["minx"], json!(-3.20));
        assert_eq!(first["maxy"], json!(55.96));
        assert!(first.contains_key("geometry"));
        assert!(!tables["routes"][2].contains_key("minx"));
    }

    #[test]
    fn test_load_rejects_non_collection() {
        let engine = MemoryEngine::new();
        assert!(engine
            .load_geojson("routes", &json!({"type": "Point"}), "geometry", &BboxFields::default())
            .is_err());
    }

    #[tokio::test]
    async fn test_query_projects_and_dedups() {
        let engine = MemoryEngine::new();
        engine
            .load_geojson("routes", &collection(), "geometry", &BboxFields::default())
            .unwrap();
        engine
            .load_geojson("routes", &collection(), "geometry", &BboxFields::default())
            .unwrap();

        let mut conn = engine.connect().await.unwrap();
        let rows = conn
            .query(&EngineQuery::new("routes", "service_id", Predicate::equals("mode", "Bus")))
            .await
            .unwrap();
        conn.close().await.unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].len(), 1);
        assert_eq!(rows[0]["service_id"], "R1");
        assert_eq!(engine.connect_count(), 1);
        assert_eq!(engine.close_count(), 1);
    }

    #[tokio::test]
    async fn test_unknown_table_is_backend_error() {
        let engine = MemoryEngine::new();
        let mut conn = engine.connect().await.unwrap();
        let err = conn
            .query(&EngineQuery::new("nope", "id", Predicate::True))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Backend(msg) if msg.contains("nope")));
    }
}
