//! Predicate construction from a compiled query.

use routescope_proto::{
    BlockType, Boundary, ClauseKind, CompiledBlock, CompiledQuery, ExecutionContext, LatLng,
    MainClause, Relation, Target, METERS_PER_DEGREE,
};

use super::{Predicate, SpatialRelation};
use crate::boundary::boundary_to_wkt;
use crate::error::{Error, Result};
use crate::geometry::BBox;

/// Below this `|cos(lat)|` no longitude span can be derived from meters.
const MIN_COS_LAT: f64 = 1e-6;

/// Spatial capability used to express point and boundary clauses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Exact geometry predicates evaluated by the engine.
    Native,
    /// Bounding-box overlap on four numeric columns. Over-approximates.
    Bbox,
}

impl Tier {
    /// Pick the best tier the context supports.
    ///
    /// Native requires both `spatialReady` and a geometry column.
    pub fn select(ctx: &ExecutionContext) -> Option<Tier> {
        if ctx.spatial_ready && ctx.geometry_field.is_some() {
            Some(Tier::Native)
        } else if ctx.bbox_ready {
            Some(Tier::Bbox)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Tier::Native => "native",
            Tier::Bbox => "bbox",
        }
    }
}

/// Box around a point covering `meters` in each direction.
///
/// Latitude span is `meters / 111320`; longitude span is divided by
/// `cos(lat)` as well.
pub fn expand_point_to_bbox(point: LatLng, meters: f64) -> Result<BBox> {
    let cos_lat = point.lat.to_radians().cos().abs();
    if cos_lat < MIN_COS_LAT {
        return Err(Error::Capability(format!(
            "cannot derive a longitude span at latitude {}",
            point.lat
        )));
    }
    let dlat = meters / METERS_PER_DEGREE;
    let dlng = meters / (METERS_PER_DEGREE * cos_lat);
    Ok(BBox::new(
        point.lng - dlng,
        point.lat - dlat,
        point.lng + dlng,
        point.lat + dlat,
    ))
}

/// Builds predicates for one execution context.
#[derive(Debug)]
pub struct PredicateBuilder<'a> {
    ctx: &'a ExecutionContext,
    tier: Tier,
    /// Geometry column for exact point clauses, if building the refined form.
    exact_field: Option<&'a str>,
}

impl<'a> PredicateBuilder<'a> {
    /// Create a builder, failing if the context has no spatial tier.
    pub fn new(ctx: &'a ExecutionContext) -> Result<Self> {
        let tier = Tier::select(ctx).ok_or_else(|| {
            Error::Capability(
                "no spatial tier: the dataset has neither native geometry nor bbox columns".into(),
            )
        })?;
        Ok(Self {
            ctx,
            tier,
            exact_field: None,
        })
    }

    /// The tier used for point clauses.
    pub fn tier(&self) -> Tier {
        self.tier
    }

    /// Combine every block of a compiled query into one predicate.
    ///
    /// Block 0 must be the main clause. Each later clause folds into the
    /// running expression: `exclude` as `AND NOT`, `also-include` as `OR`
    /// and `include` as `AND`. Always-true clauses are skipped.
    pub fn build(&self, compiled: &CompiledQuery) -> Result<Predicate> {
        if !compiled.is_compatible() {
            return Err(Error::MalformedQuery(format!(
                "unsupported contract version {}",
                compiled.version
            )));
        }
        let boundary = self.ctx.boundary.as_ref().or(compiled.boundary.as_ref());

        let mut expr: Option<Predicate> = None;
        for (i, block) in compiled.blocks.iter().enumerate() {
            let (block_type, clause) = match (i, block) {
                (0, CompiledBlock::Main(main)) => {
                    (BlockType::Include, self.main_with(main, boundary)?)
                }
                (0, CompiledBlock::Supplemental(_)) => {
                    return Err(Error::MalformedQuery("block 0 must be the main clause".into()))
                }
                (_, CompiledBlock::Main(_)) => {
                    return Err(Error::MalformedQuery(format!(
                        "block {} is a second main clause",
                        i
                    )))
                }
                (_, CompiledBlock::Supplemental(s)) => {
                    (s.block_type, self.supplemental_with(&s.clause, boundary)?)
                }
            };

            if clause.is_trivial() {
                continue;
            }
            expr = Some(match (expr, block_type) {
                (None, BlockType::Exclude) => Predicate::not(clause),
                (None, _) => clause,
                (Some(e), BlockType::Exclude) => Predicate::and(e, Predicate::not(clause)),
                (Some(e), BlockType::AlsoInclude) => Predicate::or(e, clause),
                (Some(e), BlockType::Include) => Predicate::and(e, clause),
            });
        }

        if compiled.blocks.is_empty() {
            return Err(Error::MalformedQuery("compiled query has no main clause".into()));
        }

        tracing::debug!(
            tier = self.tier.as_str(),
            blocks = compiled.blocks.len(),
            hash = %compiled.hash,
            "built predicate"
        );
        Ok(expr.unwrap_or(Predicate::True))
    }

    /// Combine the blocks as [`build`](Self::build) does, but express every
    /// point clause as a great-circle distance test on `geometry_field`.
    ///
    /// Evaluated over bbox-tier candidates, this keeps the block
    /// combination intact while replacing each box with its exact radius.
    pub fn build_exact(&self, compiled: &CompiledQuery, geometry_field: &str) -> Result<Predicate> {
        PredicateBuilder {
            ctx: self.ctx,
            tier: self.tier,
            exact_field: Some(geometry_field),
        }
        .build(compiled)
    }

    /// Predicate for the main clause, using the context's boundary.
    pub fn main_clause(&self, main: &MainClause) -> Result<Predicate> {
        self.main_with(main, self.ctx.boundary.as_ref())
    }

    /// Predicate for a supplemental clause, using the context's boundary.
    pub fn supplemental_clause(&self, clause: &ClauseKind) -> Result<Predicate> {
        self.supplemental_with(clause, self.ctx.boundary.as_ref())
    }

    fn main_with(&self, main: &MainClause, boundary: Option<&Boundary>) -> Result<Predicate> {
        match main.target {
            Target::SelectedPoint => self.point_clause(main.distance, main.relation, "the main clause"),
            Target::Boundary => match main.relation {
                Relation::Within => {
                    self.boundary_clause(SpatialRelation::Within, 0.0, boundary, "the main clause")
                }
                Relation::Intersects => self.boundary_clause(
                    SpatialRelation::Intersects,
                    main.distance,
                    boundary,
                    "the main clause",
                ),
            },
        }
    }

    fn supplemental_with(&self, clause: &ClauseKind, boundary: Option<&Boundary>) -> Result<Predicate> {
        match clause {
            ClauseKind::NearPoint { distance } => {
                self.point_clause(*distance, Relation::Within, "near_point")
            }
            ClauseKind::TouchesBoundary => {
                self.boundary_clause(SpatialRelation::Touches, 0.0, boundary, "touches_boundary")
            }
            ClauseKind::InsideBoundary => {
                self.boundary_clause(SpatialRelation::Within, 0.0, boundary, "inside_boundary")
            }
            ClauseKind::Operator { value } => {
                if value.trim().is_empty() {
                    return Ok(Predicate::True);
                }
                if self.ctx.operator_fields.is_empty() {
                    return Err(Error::MissingField("operator".into()));
                }
                Ok(Predicate::AnyOf(
                    self.ctx
                        .operator_fields
                        .iter()
                        .map(|field| Predicate::equals(field.as_str(), value.as_str()))
                        .collect(),
                ))
            }
            ClauseKind::Mode { value } => {
                if value.trim().is_empty() {
                    return Ok(Predicate::True);
                }
                let field = self
                    .ctx
                    .mode_field
                    .as_deref()
                    .ok_or_else(|| Error::MissingField("mode".into()))?;
                Ok(Predicate::equals(field, value.as_str()))
            }
        }
    }

    fn point_clause(&self, distance: f64, relation: Relation, what: &str) -> Result<Predicate> {
        let point = self
            .ctx
            .point
            .ok_or_else(|| Error::MissingPoint(what.to_string()))?;

        if let Some(field) = self.exact_field {
            return Ok(Predicate::WithinMeters {
                field: field.to_string(),
                point,
                meters: distance,
            });
        }

        match self.tier {
            Tier::Native => {
                let field = self.geometry_field()?;
                let radius = distance / METERS_PER_DEGREE;
                Ok(match relation {
                    Relation::Within => Predicate::DistanceWithin {
                        field,
                        point,
                        radius,
                    },
                    Relation::Intersects => Predicate::IntersectsBuffer {
                        field,
                        point,
                        radius,
                    },
                })
            }
            Tier::Bbox => {
                let fields = self.ctx.bbox_fields.clone().ok_or(Error::MissingBboxFields)?;
                Ok(Predicate::BboxOverlap {
                    fields,
                    bbox: expand_point_to_bbox(point, distance)?,
                })
            }
        }
    }

    fn boundary_clause(
        &self,
        relation: SpatialRelation,
        buffer_meters: f64,
        boundary: Option<&Boundary>,
        what: &str,
    ) -> Result<Predicate> {
        if self.tier != Tier::Native {
            return Err(Error::Capability(format!(
                "{} needs native spatial support; bbox columns cannot test boundaries",
                what
            )));
        }
        let boundary = boundary.ok_or_else(|| Error::MissingBoundary(what.to_string()))?;
        Ok(Predicate::Boundary {
            relation,
            field: self.geometry_field()?,
            wkt: boundary_to_wkt(boundary)?,
            buffer: buffer_meters / METERS_PER_DEGREE,
        })
    }

    fn geometry_field(&self) -> Result<String> {
        self.ctx
            .geometry_field
            .clone()
            .ok_or_else(|| Error::Capability("native tier requires a geometry field".into()))
    }
}

/// Build the predicate for a compiled query under a context.
pub fn build_predicate(compiled: &CompiledQuery, ctx: &ExecutionContext) -> Result<Predicate> {
    PredicateBuilder::new(ctx)?.build(compiled)
}
