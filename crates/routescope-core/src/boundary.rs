//! Boundary geometry normalization to WKT.

use geo_types::Geometry;
use routescope_proto::Boundary;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::geometry::{geometry_type, parse_geojson, to_wkt};

/// Convert a boundary to the WKT text embedded in native predicates.
///
/// WKT input passes through trimmed. GeoJSON input (a bare geometry or a
/// `Feature`) must be a Point, LineString, Polygon or MultiPolygon.
pub fn boundary_to_wkt(boundary: &Boundary) -> Result<String> {
    match boundary {
        Boundary::Wkt(text) => {
            let text = text.trim();
            if text.is_empty() {
                return Err(Error::MissingBoundary("an empty WKT boundary".into()));
            }
            Ok(text.to_string())
        }
        Boundary::GeoJson(value) => geojson_boundary_to_wkt(value),
    }
}

fn geojson_boundary_to_wkt(value: &Value) -> Result<String> {
    let obj = match value {
        Value::Object(obj) => obj,
        _ => {
            return Err(Error::MissingBoundary(
                "a boundary with neither WKT nor GeoJSON geometry".into(),
            ))
        }
    };

    if obj.get("type").and_then(Value::as_str) == Some("Feature") {
        match obj.get("geometry") {
            None | Some(Value::Null) => {
                return Err(Error::MissingBoundary("a feature without geometry".into()))
            }
            Some(inner) => return geojson_boundary_to_wkt(inner),
        }
    }

    let geom = parse_geojson(value)?;
    match geom {
        Geometry::Point(_)
        | Geometry::LineString(_)
        | Geometry::Polygon(_)
        | Geometry::MultiPolygon(_) => Ok(to_wkt(&geom)),
        other => Err(Error::UnsupportedGeometry(format!(
            "{} is not a supported boundary type",
            geometry_type(&other)
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_wkt_passthrough() {
        let wkt = boundary_to_wkt(&Boundary::wkt("  POLYGON((0 0,1 0,1 1,0 0)) ")).unwrap();
        assert_eq!(wkt, "POLYGON((0 0,1 0,1 1,0 0))");
        assert!(matches!(
            boundary_to_wkt(&Boundary::wkt("  ")),
            Err(Error::MissingBoundary(_))
        ));
    }

    #[test]
    fn test_geojson_types() {
        let point = boundary_to_wkt(&Boundary::geojson(json!({
            "type": "Point", "coordinates": [-3.19, 55.95]
        })))
        .unwrap();
        assert_eq!(point, "POINT(-3.19 55.95)");

        let line = boundary_to_wkt(&Boundary::geojson(json!({
            "type": "LineString", "coordinates": [[0, 0], [1, 1]]
        })))
        .unwrap();
        assert_eq!(line, "LINESTRING(0 0,1 1)");

        let polygon = boundary_to_wkt(&Boundary::geojson(json!({
            "type": "Polygon", "coordinates": [[[0, 0], [1, 0], [1, 1], [0, 0]]]
        })))
        .unwrap();
        assert_eq!(polygon, "POLYGON((0 0,1 0,1 1,0 0))");

        let multi = boundary_to_wkt(&Boundary::geojson(json!({
            "type": "MultiPolygon",
            "coordinates": [[[[0, 0], [1, 0], [1, 1], [0, 0]]], [[[5, 5], [6, 5], [6, 6], [5, 5]]]]
        })))
        .unwrap();
        assert!(multi.starts_with("MULTIPOLYGON"));
    }

    #[test]
    fn test_feature_is_unwrapped() {
        let wkt = boundary_to_wkt(&Boundary::geojson(json!({
            "type": "Feature",
            "properties": {"name": "Leith"},
            "geometry": {"type": "Point", "coordinates": [1, 2]}
        })))
        .unwrap();
        assert_eq!(wkt, "POINT(1 2)");

        let empty = Boundary::geojson(json!({"type": "Feature", "geometry": null}));
        assert!(matches!(boundary_to_wkt(&empty), Err(Error::MissingBoundary(_))));
    }

    #[test]
    fn test_unsupported_and_missing() {
        let multipoint = Boundary::geojson(json!({
            "type": "MultiPoint", "coordinates": [[0, 0], [1, 1]]
        }));
        assert!(matches!(
            boundary_to_wkt(&multipoint),
            Err(Error::UnsupportedGeometry(msg)) if msg.contains("MultiPoint")
        ));
        assert!(matches!(
            boundary_to_wkt(&Boundary::geojson(json!(null))),
            Err(Error::MissingBoundary(_))
        ));
    }
}
