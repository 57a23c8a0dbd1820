//! In-memory predicate evaluation over JSON rows.

use geo::{Contains, Intersects};
use geo_types::Geometry;
use serde_json::Value;

use super::{Predicate, SpatialRelation};
use crate::error::{Error, Result};
use crate::geometry::{parse_cell, parse_wkt, planar_distance_degrees};
use crate::postfilter::within_distance;
use crate::row::{id_to_string, Row};

/// Evaluates predicates against rows.
///
/// Spatial tests run in degree space, mirroring how the SQL rendering
/// compares `ST_Distance` against a degree radius. Missing columns and
/// unparseable geometries never match.
pub struct PredicateEvaluator;

impl PredicateEvaluator {
    /// Evaluate a predicate against a row.
    pub fn evaluate(predicate: &Predicate, row: &Row) -> Result<bool> {
        match predicate {
            Predicate::True => Ok(true),
            Predicate::And(l, r) => Ok(Self::evaluate(l, row)? && Self::evaluate(r, row)?),
            Predicate::Or(l, r) => Ok(Self::evaluate(l, row)? || Self::evaluate(r, row)?),
            Predicate::Not(inner) => Ok(!Self::evaluate(inner, row)?),
            Predicate::AnyOf(members) => {
                for p in members {
                    if Self::evaluate(p, row)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
            Predicate::Equals { field, value } => Ok(row
                .get(field)
                .and_then(id_to_string)
                .is_some_and(|v| v == *value)),
            Predicate::DistanceWithin {
                field,
                point,
                radius,
            }
            | Predicate::IntersectsBuffer {
                field,
                point,
                radius,
            } => Ok(Self::geometry(row, field)
                .and_then(|g| planar_distance_degrees(&g, *point))
                .is_some_and(|d| d <= *radius)),
            Predicate::WithinMeters {
                field,
                point,
                meters,
            } => Ok(Self::geometry(row, field)
                .is_some_and(|g| within_distance(&g, *point, *meters))),
            Predicate::Boundary {
                relation,
                field,
                wkt,
                buffer,
            } => {
                let Some(geom) = Self::geometry(row, field) else {
                    return Ok(false);
                };
                Self::relate(&geom, *relation, wkt, *buffer)
            }
            Predicate::BboxOverlap { fields, bbox } => {
                let num = |name: &str| row.get(name).and_then(Value::as_f64);
                match (
                    num(&fields.minx),
                    num(&fields.miny),
                    num(&fields.maxx),
                    num(&fields.maxy),
                ) {
                    (Some(minx), Some(miny), Some(maxx), Some(maxy)) => Ok(minx <= bbox.maxx
                        && maxx >= bbox.minx
                        && miny <= bbox.maxy
                        && maxy >= bbox.miny),
                    _ => Ok(false),
                }
            }
        }
    }

    /// Keep the rows a predicate accepts.
    pub fn filter<'r>(predicate: &Predicate, rows: &'r [Row]) -> Result<Vec<&'r Row>> {
        let mut out = Vec::new();
        for row in rows {
            if Self::evaluate(predicate, row)? {
                out.push(row);
            }
        }
        Ok(out)
    }

    fn geometry(row: &Row, field: &str) -> Option<Geometry<f64>> {
        row.get(field).and_then(|v| parse_cell(v).ok())
    }

    fn relate(geom: &Geometry<f64>, relation: SpatialRelation, wkt: &str, buffer: f64) -> Result<bool> {
        let boundary = parse_wkt(wkt)?;
        match relation {
            SpatialRelation::Within => Ok(boundary.contains(geom)),
            SpatialRelation::Intersects if buffer > 0.0 => match boundary {
                Geometry::Point(p) => Ok(planar_distance_degrees(
                    geom,
                    routescope_proto::LatLng::new(p.y(), p.x()),
                )
                .is_some_and(|d| d <= buffer)),
                _ => Err(Error::Evaluation(
                    "buffered intersects is only evaluated in memory for point boundaries".into(),
                )),
            },
            SpatialRelation::Intersects => Ok(geom.intersects(&boundary)),
            SpatialRelation::Touches => Err(Error::Evaluation(
                "touches is not evaluated in memory".into(),
            )),
        }
    }
}
