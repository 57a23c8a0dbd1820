//! Backend-neutral predicate tree.
//!
//! [`PredicateBuilder`] produces a [`Predicate`] from a compiled query. The
//! tree renders to SQL text with [`Predicate::to_sql`] and evaluates
//! against in-memory rows with [`PredicateEvaluator`].

mod builder;
mod eval;

pub use builder::{build_predicate, expand_point_to_bbox, PredicateBuilder, Tier};
pub use eval::PredicateEvaluator;

use std::fmt;

use routescope_proto::{BboxFields, LatLng};
use serde::{Deserialize, Serialize};

use crate::geometry::BBox;

/// Relation between a row geometry and a boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpatialRelation {
    Intersects,
    Within,
    Touches,
}

impl SpatialRelation {
    /// SQL function implementing the relation.
    pub fn sql_function(&self) -> &'static str {
        match self {
            SpatialRelation::Intersects => "ST_Intersects",
            SpatialRelation::Within => "ST_Within",
            SpatialRelation::Touches => "ST_Touches",
        }
    }
}

/// A boolean row predicate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// Always true.
    True,
    And(Box<Predicate>, Box<Predicate>),
    Or(Box<Predicate>, Box<Predicate>),
    Not(Box<Predicate>),
    /// True if any member is true; false when empty.
    AnyOf(Vec<Predicate>),
    /// Column equals a string literal.
    Equals { field: String, value: String },
    /// Row geometry lies within `radius` degrees of the point.
    DistanceWithin {
        field: String,
        point: LatLng,
        radius: f64,
    },
    /// Row geometry intersects a disc of `radius` degrees around the point.
    IntersectsBuffer {
        field: String,
        point: LatLng,
        radius: f64,
    },
    /// Row geometry lies within `meters` of the point by great-circle
    /// distance. Used to re-check bbox candidates.
    WithinMeters {
        field: String,
        point: LatLng,
        meters: f64,
    },
    /// Row geometry relates to a boundary given as WKT.
    ///
    /// A positive `buffer` widens the boundary before an intersects test.
    Boundary {
        relation: SpatialRelation,
        field: String,
        wkt: String,
        buffer: f64,
    },
    /// Row bbox columns overlap the given box.
    BboxOverlap { fields: BboxFields, bbox: BBox },
}

impl Predicate {
    pub fn and(left: Predicate, right: Predicate) -> Self {
        Predicate::And(Box::new(left), Box::new(right))
    }

    pub fn or(left: Predicate, right: Predicate) -> Self {
        Predicate::Or(Box::new(left), Box::new(right))
    }

    #[allow(clippy::should_implement_trait)]
    pub fn not(inner: Predicate) -> Self {
        Predicate::Not(Box::new(inner))
    }

    pub fn equals(field: impl Into<String>, value: impl Into<String>) -> Self {
        Predicate::Equals {
            field: field.into(),
            value: value.into(),
        }
    }

    /// Whether this predicate is the always-true clause.
    pub fn is_trivial(&self) -> bool {
        matches!(self, Predicate::True)
    }

    /// Columns the predicate reads, in first-seen order.
    pub fn columns(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_columns(&mut out);
        out
    }

    fn collect_columns<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Predicate::True => {}
            Predicate::And(l, r) | Predicate::Or(l, r) => {
                l.collect_columns(out);
                r.collect_columns(out);
            }
            Predicate::Not(inner) => inner.collect_columns(out),
            Predicate::AnyOf(members) => {
                for p in members {
                    p.collect_columns(out);
                }
            }
            Predicate::Equals { field, .. }
            | Predicate::DistanceWithin { field, .. }
            | Predicate::IntersectsBuffer { field, .. }
            | Predicate::WithinMeters { field, .. }
            | Predicate::Boundary { field, .. } => push_unique(out, field),
            Predicate::BboxOverlap { fields, .. } => {
                for name in [&fields.minx, &fields.miny, &fields.maxx, &fields.maxy] {
                    push_unique(out, name);
                }
            }
        }
    }

    /// Render as a SQL boolean expression.
    ///
    /// Identifiers are double-quoted and string literals single-quoted,
    /// with embedded quotes doubled. Every binary node is parenthesized.
    pub fn to_sql(&self) -> String {
        match self {
            Predicate::True => "TRUE".to_string(),
            Predicate::And(l, r) => format!("({} AND {})", l.to_sql(), r.to_sql()),
            Predicate::Or(l, r) => format!("({} OR {})", l.to_sql(), r.to_sql()),
            Predicate::Not(inner) => format!("NOT ({})", inner.to_sql()),
            Predicate::AnyOf(members) => match members.as_slice() {
                [] => "FALSE".to_string(),
                [only] => only.to_sql(),
                _ => format!(
                    "({})",
                    members
                        .iter()
                        .map(Predicate::to_sql)
                        .collect::<Vec<_>>()
                        .join(" OR ")
                ),
            },
            Predicate::Equals { field, value } => {
                format!("{} = {}", quote_ident(field), quote_literal(value))
            }
            Predicate::DistanceWithin {
                field,
                point,
                radius,
            } => format!(
                "ST_Distance({}, ST_Point({}, {})) <= {}",
                quote_ident(field),
                point.lng,
                point.lat,
                radius
            ),
            Predicate::IntersectsBuffer {
                field,
                point,
                radius,
            } => format!(
                "ST_Intersects({}, ST_Buffer(ST_Point({}, {}), {}))",
                quote_ident(field),
                point.lng,
                point.lat,
                radius
            ),
            Predicate::WithinMeters {
                field,
                point,
                meters,
            } => format!(
                "ST_Distance_Sphere({}, ST_Point({}, {})) <= {}",
                quote_ident(field),
                point.lng,
                point.lat,
                meters
            ),
            Predicate::Boundary {
                relation,
                field,
                wkt,
                buffer,
            } => {
                let shape = format!("ST_GeomFromText({})", quote_literal(wkt));
                if *buffer > 0.0 {
                    format!(
                        "{}({}, ST_Buffer({}, {}))",
                        relation.sql_function(),
                        quote_ident(field),
                        shape,
                        buffer
                    )
                } else {
                    format!("{}({}, {})", relation.sql_function(), quote_ident(field), shape)
                }
            }
            Predicate::BboxOverlap { fields, bbox } => format!(
                "({} <= {} AND {} >= {} AND {} <= {} AND {} >= {})",
                quote_ident(&fields.minx),
                bbox.maxx,
                quote_ident(&fields.maxx),
                bbox.minx,
                quote_ident(&fields.miny),
                bbox.maxy,
                quote_ident(&fields.maxy),
                bbox.miny
            ),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_sql())
    }
}

fn push_unique<'a>(out: &mut Vec<&'a str>, name: &'a str) {
    if !out.contains(&name) {
        out.push(name);
    }
}

/// Quote a SQL identifier.
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Quote a SQL string literal.
pub fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}
