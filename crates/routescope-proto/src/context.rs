//! Per-call capability snapshot.
//!
//! The caller builds an [`ExecutionContext`] describing what the backing
//! dataset and engine can do (which columns exist, whether exact spatial
//! predicates are available) plus the user's current point and boundary.
//! The core only ever reads it.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
}

impl LatLng {
    /// Create a coordinate.
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Both components are finite numbers.
    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }
}

/// Names of the per-row bounding-box columns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BboxFields {
    pub minx: String,
    pub miny: String,
    pub maxx: String,
    pub maxy: String,
}

impl BboxFields {
    /// Create from explicit column names.
    pub fn new(
        minx: impl Into<String>,
        miny: impl Into<String>,
        maxx: impl Into<String>,
        maxy: impl Into<String>,
    ) -> Self {
        Self {
            minx: minx.into(),
            miny: miny.into(),
            maxx: maxx.into(),
            maxy: maxy.into(),
        }
    }
}

impl Default for BboxFields {
    fn default() -> Self {
        Self::new("minx", "miny", "maxx", "maxy")
    }
}

/// Boundary geometry supplied by the caller.
///
/// Accepts either WKT text or a GeoJSON geometry/Feature object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Boundary {
    /// Well-Known Text.
    Wkt(String),
    /// GeoJSON geometry or Feature.
    GeoJson(serde_json::Value),
}

impl Boundary {
    /// Wrap WKT text.
    pub fn wkt(wkt: impl Into<String>) -> Self {
        Boundary::Wkt(wkt.into())
    }

    /// Wrap a GeoJSON geometry or Feature.
    pub fn geojson(value: serde_json::Value) -> Self {
        Boundary::GeoJson(value)
    }
}

/// Capability snapshot for one call.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExecutionContext {
    /// Column holding the route/stop identifier. Required for execution.
    pub service_id_field: Option<String>,
    /// Exact spatial predicates are available.
    pub spatial_ready: bool,
    /// Column holding the native geometry.
    pub geometry_field: Option<String>,
    /// Per-row bounding-box columns are available.
    pub bbox_ready: bool,
    /// Names of the bounding-box columns.
    pub bbox_fields: Option<BboxFields>,
    /// Candidate columns for the operator attribute.
    pub operator_fields: Vec<String>,
    /// Column for the mode attribute.
    pub mode_field: Option<String>,
    /// Column holding per-row geometry as GeoJSON text.
    pub geojson_field: Option<String>,
    /// The user's selected point.
    pub point: Option<LatLng>,
    /// The selected boundary.
    pub boundary: Option<Boundary>,
}

impl ExecutionContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the identifier column.
    pub fn with_service_id_field(mut self, field: impl Into<String>) -> Self {
        self.service_id_field = Some(field.into());
        self
    }

    /// Enable the native spatial tier on the given geometry column.
    pub fn with_native_geometry(mut self, field: impl Into<String>) -> Self {
        self.spatial_ready = true;
        self.geometry_field = Some(field.into());
        self
    }

    /// Enable the bounding-box tier.
    pub fn with_bbox_fields(mut self, fields: BboxFields) -> Self {
        self.bbox_ready = true;
        self.bbox_fields = Some(fields);
        self
    }

    /// Set the operator attribute candidates.
    pub fn with_operator_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.operator_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// Set the mode column.
    pub fn with_mode_field(mut self, field: impl Into<String>) -> Self {
        self.mode_field = Some(field.into());
        self
    }

    /// Set the GeoJSON geometry column.
    pub fn with_geojson_field(mut self, field: impl Into<String>) -> Self {
        self.geojson_field = Some(field.into());
        self
    }

    /// Set the selected point.
    pub fn with_point(mut self, lat: f64, lng: f64) -> Self {
        self.point = Some(LatLng::new(lat, lng));
        self
    }

    /// Set the boundary.
    pub fn with_boundary(mut self, boundary: Boundary) -> Self {
        self.boundary = Some(boundary);
        self
    }

    pub fn has_point(&self) -> bool {
        self.point.is_some()
    }

    pub fn has_boundary(&self) -> bool {
        self.boundary.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_camel_case() {
        let ctx: ExecutionContext = serde_json::from_value(serde_json::json!({
            "serviceIdField": "service_id",
            "spatialReady": true,
            "geometryField": "geometry",
            "bboxFields": { "minx": "a", "miny": "b", "maxx": "c", "maxy": "d" },
            "operatorFields": ["operatorCode", "operatorName"],
            "point": { "lat": 55.9533, "lng": -3.1883 }
        }))
        .unwrap();

        assert_eq!(ctx.service_id_field.as_deref(), Some("service_id"));
        assert!(ctx.spatial_ready);
        assert!(!ctx.bbox_ready);
        assert_eq!(ctx.operator_fields.len(), 2);
        assert_eq!(ctx.bbox_fields.unwrap().maxy, "d");
        assert_eq!(ctx.point, Some(LatLng::new(55.9533, -3.1883)));
    }

    #[test]
    fn test_boundary_untagged() {
        let wkt: Boundary = serde_json::from_value(serde_json::json!("POINT(1 2)")).unwrap();
        assert_eq!(wkt, Boundary::wkt("POINT(1 2)"));

        let gj: Boundary =
            serde_json::from_value(serde_json::json!({ "type": "Point", "coordinates": [1, 2] }))
                .unwrap();
        assert!(matches!(gj, Boundary::GeoJson(_)));
    }
}
