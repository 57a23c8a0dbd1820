//! Geometry parsing and distance primitives.
//!
//! Row and boundary geometries arrive as GeoJSON (objects or text) or WKT
//! and are normalized to [`geo_types::Geometry`]. Coordinates are `[lng, lat]`
//! throughout, matching GeoJSON axis order.

use std::str::FromStr;

use geo::{BoundingRect, Contains};
use geo_types::{
    Coord, Geometry, GeometryCollection, LineString, MultiLineString, MultiPoint, MultiPolygon,
    Point, Polygon,
};
use routescope_proto::LatLng;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{Error, Result};

/// Mean Earth radius used by every great-circle computation.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Axis-aligned bounding box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub minx: f64,
    pub miny: f64,
    pub maxx: f64,
    pub maxy: f64,
}

impl BBox {
    /// Create a new bounding box.
    pub fn new(minx: f64, miny: f64, maxx: f64, maxy: f64) -> Self {
        Self {
            minx,
            miny,
            maxx,
            maxy,
        }
    }

    /// Closed-interval overlap on both axes.
    pub fn intersects(&self, other: &BBox) -> bool {
        self.minx <= other.maxx
            && self.maxx >= other.minx
            && self.miny <= other.maxy
            && self.maxy >= other.miny
    }

    /// Check if this bbox contains a coordinate.
    pub fn contains_coord(&self, c: Coord<f64>) -> bool {
        c.x >= self.minx && c.x <= self.maxx && c.y >= self.miny && c.y <= self.maxy
    }

    /// Compute from a geo-types Geometry.
    pub fn from_geometry(geom: &Geometry<f64>) -> Option<Self> {
        let rect = geom.bounding_rect()?;
        Some(Self::new(rect.min().x, rect.min().y, rect.max().x, rect.max().y))
    }
}

/// GeoJSON type name of a geometry.
pub fn geometry_type(geom: &Geometry<f64>) -> &'static str {
    match geom {
        Geometry::Point(_) => "Point",
        Geometry::LineString(_) => "LineString",
        Geometry::Polygon(_) => "Polygon",
        Geometry::MultiPoint(_) => "MultiPoint",
        Geometry::MultiLineString(_) => "MultiLineString",
        Geometry::MultiPolygon(_) => "MultiPolygon",
        Geometry::GeometryCollection(_) => "GeometryCollection",
        Geometry::Line(_) => "Line",
        Geometry::Rect(_) => "Rect",
        Geometry::Triangle(_) => "Triangle",
    }
}

/// Parse a GeoJSON geometry object.
///
/// A `Feature` is unwrapped to its `geometry` member.
pub fn parse_geojson(value: &Value) -> Result<Geometry<f64>> {
    let obj = value
        .as_object()
        .ok_or_else(|| Error::InvalidGeometry("GeoJSON geometry must be an object".into()))?;
    let kind = obj
        .get("type")
        .and_then(Value::as_str)
        .ok_or_else(|| Error::InvalidGeometry("GeoJSON object has no type".into()))?;

    match kind {
        "Feature" => match obj.get("geometry") {
            None | Some(Value::Null) => {
                Err(Error::InvalidGeometry("feature has no geometry".into()))
            }
            Some(geometry) => parse_geojson(geometry),
        },
        "GeometryCollection" => {
            let members = obj
                .get("geometries")
                .and_then(Value::as_array)
                .ok_or_else(|| Error::InvalidGeometry("collection has no geometries".into()))?;
            let parsed = members
                .iter()
                .map(parse_geojson)
                .collect::<Result<Vec<_>>>()?;
            Ok(Geometry::GeometryCollection(GeometryCollection(parsed)))
        }
        _ => {
            let coordinates = obj
                .get("coordinates")
                .ok_or_else(|| Error::InvalidGeometry(format!("{} has no coordinates", kind)))?;
            match kind {
                "Point" => Ok(Geometry::Point(Point(coord(coordinates)?))),
                "MultiPoint" => Ok(Geometry::MultiPoint(MultiPoint(
                    coord_list(coordinates)?.into_iter().map(Point).collect(),
                ))),
                "LineString" => Ok(Geometry::LineString(line_string(coordinates)?)),
                "MultiLineString" => Ok(Geometry::MultiLineString(MultiLineString(
                    array(coordinates)?
                        .iter()
                        .map(line_string)
                        .collect::<Result<Vec<_>>>()?,
                ))),
                "Polygon" => Ok(Geometry::Polygon(polygon(coordinates)?)),
                "MultiPolygon" => Ok(Geometry::MultiPolygon(MultiPolygon(
                    array(coordinates)?
                        .iter()
                        .map(polygon)
                        .collect::<Result<Vec<_>>>()?,
                ))),
                other => Err(Error::UnsupportedGeometry(other.to_string())),
            }
        }
    }
}

/// Parse GeoJSON text.
pub fn parse_geojson_str(text: &str) -> Result<Geometry<f64>> {
    let value: Value =
        serde_json::from_str(text).map_err(|e| Error::InvalidGeometry(e.to_string()))?;
    parse_geojson(&value)
}

/// Parse WKT text into a geo-types Geometry.
pub fn parse_wkt(text: &str) -> Result<Geometry<f64>> {
    wkt::Wkt::from_str(text)
        .map_err(|e| Error::InvalidGeometry(format!("{:?}", e)))
        .and_then(|w| {
            w.try_into()
                .map_err(|e: wkt::conversion::Error| Error::InvalidGeometry(format!("{:?}", e)))
        })
}

/// Parse a row cell holding a geometry.
///
/// Accepts a GeoJSON object, GeoJSON text or WKT text.
pub fn parse_cell(value: &Value) -> Result<Geometry<f64>> {
    match value {
        Value::Object(_) => parse_geojson(value),
        Value::String(s) => {
            let text = s.trim();
            if text.starts_with('{') {
                parse_geojson_str(text)
            } else {
                parse_wkt(text)
            }
        }
        other => Err(Error::InvalidGeometry(format!(
            "expected a geometry, found {}",
            other
        ))),
    }
}

/// Render a geometry as WKT.
pub fn to_wkt(geom: &Geometry<f64>) -> String {
    use wkt::ToWkt;
    geom.wkt_string()
}

fn array(value: &Value) -> Result<&Vec<Value>> {
    value
        .as_array()
        .ok_or_else(|| Error::InvalidGeometry("coordinates must be an array".into()))
}

fn coord(value: &Value) -> Result<Coord<f64>> {
    let pos = array(value)?;
    match (pos.first().and_then(Value::as_f64), pos.get(1).and_then(Value::as_f64)) {
        (Some(x), Some(y)) => Ok(Coord { x, y }),
        _ => Err(Error::InvalidGeometry(
            "a position needs numeric [lng, lat]".into(),
        )),
    }
}

fn coord_list(value: &Value) -> Result<Vec<Coord<f64>>> {
    array(value)?.iter().map(coord).collect()
}

fn line_string(value: &Value) -> Result<LineString<f64>> {
    Ok(LineString(coord_list(value)?))
}

fn polygon(value: &Value) -> Result<Polygon<f64>> {
    let mut rings = array(value)?
        .iter()
        .map(line_string)
        .collect::<Result<Vec<_>>>()?
        .into_iter();
    let exterior = rings
        .next()
        .ok_or_else(|| Error::InvalidGeometry("polygon has no rings".into()))?;
    Ok(Polygon::new(exterior, rings.collect()))
}

/// Haversine distance between two points in meters.
pub fn haversine_distance(lat1: f64, lng1: f64, lat2: f64, lng2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lng = (lng2 - lng1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lng / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_METERS * c
}

/// Closest point to `p` on segment `a`-`b`, projected in degree space.
///
/// The projection parameter is clamped to `[0, 1]`; a degenerate segment
/// returns `a`.
pub fn closest_point_on_segment(p: Coord<f64>, a: Coord<f64>, b: Coord<f64>) -> Coord<f64> {
    let dx = b.x - a.x;
    let dy = b.y - a.y;
    let len2 = dx * dx + dy * dy;
    if len2 == 0.0 {
        return a;
    }
    let t = (((p.x - a.x) * dx + (p.y - a.y) * dy) / len2).clamp(0.0, 1.0);
    Coord {
        x: a.x + t * dx,
        y: a.y + t * dy,
    }
}

/// Great-circle distance in meters from a point to the nearest segment of
/// a line. `None` for a line with fewer than two positions.
pub fn distance_to_line_meters(line: &LineString<f64>, point: LatLng) -> Option<f64> {
    let p = Coord {
        x: point.lng,
        y: point.lat,
    };
    line.lines()
        .map(|seg| {
            let c = closest_point_on_segment(p, seg.start, seg.end);
            haversine_distance(point.lat, point.lng, c.y, c.x)
        })
        .reduce(f64::min)
}

fn planar(a: Coord<f64>, b: Coord<f64>) -> f64 {
    (a.x - b.x).hypot(a.y - b.y)
}

fn planar_to_line(line: &LineString<f64>, p: Coord<f64>) -> Option<f64> {
    match line.0.as_slice() {
        [] => None,
        [only] => Some(planar(*only, p)),
        _ => line
            .lines()
            .map(|seg| planar(closest_point_on_segment(p, seg.start, seg.end), p))
            .reduce(f64::min),
    }
}

/// Planar distance in degrees from a point to a geometry.
///
/// A point inside a polygon is at distance zero. Returns `None` for empty
/// geometries and for types without a distance rule.
pub fn planar_distance_degrees(geom: &Geometry<f64>, point: LatLng) -> Option<f64> {
    let p = Coord {
        x: point.lng,
        y: point.lat,
    };
    match geom {
        Geometry::Point(pt) => Some(planar(pt.0, p)),
        Geometry::MultiPoint(mp) => mp.0.iter().map(|pt| planar(pt.0, p)).reduce(f64::min),
        Geometry::LineString(ls) => planar_to_line(ls, p),
        Geometry::MultiLineString(mls) => {
            mls.0.iter().filter_map(|ls| planar_to_line(ls, p)).reduce(f64::min)
        }
        Geometry::Polygon(poly) => polygon_distance(poly, p),
        Geometry::MultiPolygon(mp) => {
            mp.0.iter().filter_map(|poly| polygon_distance(poly, p)).reduce(f64::min)
        }
        Geometry::GeometryCollection(gc) => gc
            .0
            .iter()
            .filter_map(|g| planar_distance_degrees(g, point))
            .reduce(f64::min),
        _ => None,
    }
}

fn polygon_distance(poly: &Polygon<f64>, p: Coord<f64>) -> Option<f64> {
    if poly.contains(&Point(p)) {
        return Some(0.0);
    }
    std::iter::once(poly.exterior())
        .chain(poly.interiors())
        .filter_map(|ring| planar_to_line(ring, p))
        .reduce(f64::min)
}
