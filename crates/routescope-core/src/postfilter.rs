//! Exact distance refinement for bbox-tier candidates.
//!
//! The bbox tier over-approximates a radius. When per-row geometry is
//! available, candidates are re-checked with great-circle distances and
//! the false positives are dropped.

use geo_types::Geometry;
use routescope_proto::LatLng;

use crate::geometry::{distance_to_line_meters, haversine_distance};
use crate::predicate::{Predicate, PredicateEvaluator};
use crate::row::{dedup_ids, row_id, Row};

/// Whether a geometry lies within `meters` of a point.
///
/// Points use one haversine check. Lines match if any segment's closest
/// point is within range; multi-lines if any member line matches. Every
/// other geometry type is treated as out of range.
pub fn within_distance(geom: &Geometry<f64>, point: LatLng, meters: f64) -> bool {
    match geom {
        Geometry::Point(p) => haversine_distance(point.lat, point.lng, p.y(), p.x()) <= meters,
        Geometry::LineString(ls) => {
            distance_to_line_meters(ls, point).is_some_and(|d| d <= meters)
        }
        Geometry::MultiLineString(mls) => mls
            .0
            .iter()
            .any(|ls| distance_to_line_meters(ls, point).is_some_and(|d| d <= meters)),
        _ => false,
    }
}

/// Post-filter over candidate rows.
///
/// Holds the exact form of the query, built by
/// [`PredicateBuilder::build_exact`](crate::PredicateBuilder::build_exact),
/// so attribute branches combine with exact distances the same way they
/// combined with boxes.
#[derive(Debug, Clone)]
pub struct PostFilter {
    predicate: Predicate,
    id_field: String,
}

impl PostFilter {
    pub fn new(predicate: Predicate, id_field: impl Into<String>) -> Self {
        Self {
            predicate,
            id_field: id_field.into(),
        }
    }

    /// Filter keeping rows whose geometry lies within `meters` of `point`.
    pub fn within(
        point: LatLng,
        meters: f64,
        id_field: impl Into<String>,
        geometry_field: impl Into<String>,
    ) -> Self {
        Self::new(
            Predicate::WithinMeters {
                field: geometry_field.into(),
                point,
                meters,
            },
            id_field,
        )
    }

    /// Columns candidates must carry besides the identifier.
    pub fn columns(&self) -> Vec<&str> {
        self.predicate.columns()
    }

    /// Whether a row passes. Rows that cannot be evaluated fail.
    pub fn accepts(&self, row: &Row) -> bool {
        match PredicateEvaluator::evaluate(&self.predicate, row) {
            Ok(pass) => pass,
            Err(e) => {
                tracing::debug!(error = %e, "skipping row that cannot be re-checked");
                false
            }
        }
    }

    /// Identifiers of the rows that pass, deduplicated in row order.
    pub fn apply(&self, rows: &[Row]) -> Vec<String> {
        let ids = rows
            .iter()
            .filter(|row| self.accepts(row))
            .filter_map(|row| row_id(row, &self.id_field));
        let kept = dedup_ids(ids);
        tracing::debug!(
            candidates = rows.len(),
            kept = kept.len(),
            "post-filtered bbox candidates"
        );
        kept
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{parse_wkt, EARTH_RADIUS_METERS};
    use serde_json::json;

    fn row(id: &str, geometry: serde_json::Value) -> Row {
        [
            ("service_id".to_string(), json!(id)),
            ("geojson".to_string(), geometry),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn test_point_within_distance() {
        let origin = LatLng::new(55.9533, -3.1883);
        let geom = parse_wkt("POINT(-3.1883 55.9533)").unwrap();
        assert!(within_distance(&geom, origin, 0.0));

        // ~111 m north.
        let north = parse_wkt("POINT(-3.1883 55.9543)").unwrap();
        assert!(within_distance(&north, origin, 120.0));
        assert!(!within_distance(&north, origin, 100.0));
    }

    #[test]
    fn test_segment_distance_matches_ground_truth() {
        let line = parse_wkt("LINESTRING(-3.20 55.95,-3.18 55.95)").unwrap();
        let Geometry::LineString(ls) = &line else {
            panic!("expected a line");
        };
        let point = LatLng::new(55.96, -3.19);
        // Directly north of the segment midpoint: the foot is (55.95, -3.19)
        // and the great-circle distance is a pure latitude arc.
        let truth = (0.01f64).to_radians() * EARTH_RADIUS_METERS;
        let d = distance_to_line_meters(ls, point).unwrap();
        assert!(((d - truth) / truth).abs() < 1e-3, "{} vs {}", d, truth);

        assert!(within_distance(&line, point, truth * 1.001));
        assert!(!within_distance(&line, point, truth * 0.99));
    }

    #[test]
    fn test_segment_endpoint_clamp() {
        let line = parse_wkt("LINESTRING(0 0,1 0)").unwrap();
        // Beyond the east end: the closest point is the endpoint.
        let point = LatLng::new(0.0, 1.001);
        let expected = haversine_distance(0.0, 1.001, 0.0, 1.0);
        assert!(within_distance(&line, point, expected + 0.01));
        assert!(!within_distance(&line, point, expected - 0.01));
    }

    #[test]
    fn test_multilinestring_any_member() {
        let geom = parse_wkt("MULTILINESTRING((10 10,11 10),(0 0,0 1))").unwrap();
        assert!(within_distance(&geom, LatLng::new(0.5, 0.0), 1.0));
        assert!(!within_distance(&geom, LatLng::new(5.0, 5.0), 1000.0));
    }

    #[test]
    fn test_other_types_never_match() {
        let poly = parse_wkt("POLYGON((0 0,1 0,1 1,0 1,0 0))").unwrap();
        assert!(!within_distance(&poly, LatLng::new(0.5, 0.5), 1e9));
    }

    #[test]
    fn test_apply_skips_bad_rows_and_dedups() {
        let filter = PostFilter::within(LatLng::new(0.0, 0.0), 500.0, "service_id", "geojson");
        let rows = vec![
            row("A", json!({"type": "Point", "coordinates": [0.001, 0.0]})),
            row("B", json!("{broken")),
            row("A", json!({"type": "LineString", "coordinates": [[0.0, 0.002], [0.0, 0.004]]})),
            row("C", json!({"type": "Point", "coordinates": [1.0, 1.0]})),
            row("D", json!(null)),
        ];
        assert_eq!(filter.apply(&rows), vec!["A"]);
    }

    #[test]
    fn test_attribute_branch_survives_refinement() {
        // (within 500 m) OR mode = 'Rail'
        let filter = PostFilter::new(
            Predicate::or(
                Predicate::WithinMeters {
                    field: "geojson".into(),
                    point: LatLng::new(0.0, 0.0),
                    meters: 500.0,
                },
                Predicate::equals("mode", "Rail"),
            ),
            "service_id",
        );
        let mut far_rail = row("FAR_RAIL", json!({"type": "Point", "coordinates": [0.0, 1.0]}));
        far_rail.insert("mode".into(), json!("Rail"));
        let mut far_bus = row("FAR_BUS", json!({"type": "Point", "coordinates": [0.0, 1.0]}));
        far_bus.insert("mode".into(), json!("Bus"));
        let near = row("NEAR", json!({"type": "Point", "coordinates": [0.001, 0.0]}));

        assert_eq!(filter.columns(), vec!["geojson", "mode"]);
        assert_eq!(filter.apply(&[near, far_rail, far_bus]), vec!["NEAR", "FAR_RAIL"]);
    }
}
