//! Context-aware query validation.
//!
//! Validity depends on what the caller's dataset can do, so every rule
//! reads the [`ExecutionContext`] alongside the query. All rules run; a
//! rule is only skipped when a value it inspects is missing.

use routescope_proto::{BlockOperator, ExecutionContext, SpatialQuery, Target};

use crate::error::ValidationError;

/// Below this `|cos(lat)|` the meters-to-longitude conversion is undefined.
pub const POLAR_COS_EPSILON: f64 = 1e-6;

/// Validate a query against a context.
///
/// Returns every violation in check order; an empty list means valid.
pub fn validate_query(query: &SpatialQuery, ctx: &ExecutionContext) -> Vec<String> {
    let mut errors = Vec::new();

    if !query.distance.is_finite() || query.distance < 0.0 {
        errors.push("distance must be a finite number >= 0".to_string());
    }

    match query.target {
        Target::SelectedPoint => {
            match ctx.point {
                None => errors.push("target 'selected_point' requires a selected point".to_string()),
                Some(point) if !point.is_finite() => {
                    errors.push("selected point must have finite lat/lng".to_string())
                }
                Some(point) if is_polar(point.lat) => errors.push(format!(
                    "selected point latitude {} is too close to a pole: longitude degrees per meter are undefined",
                    point.lat
                )),
                Some(_) => {}
            }
            if !ctx.spatial_ready && !ctx.bbox_ready {
                errors.push(
                    "no spatial tier available: either spatialReady or bboxReady must be set"
                        .to_string(),
                );
            }
        }
        Target::Boundary => {
            if ctx.boundary.is_none() {
                errors.push("target 'boundary' requires a boundary geometry".to_string());
            }
            if !ctx.spatial_ready {
                errors.push(
                    "target 'boundary' requires native spatial support (spatialReady); bbox approximation cannot test containment"
                        .to_string(),
                );
            }
        }
    }

    for (i, block) in query.blocks.iter().enumerate() {
        let n = i + 1;

        if let Some(t) = &block.block_type {
            if block.parsed_type().is_err() {
                errors.push(format!(
                    "block {}: unknown type '{}' (expected include, exclude or also-include)",
                    n, t
                ));
            }
        }

        let operator = match block.parsed_operator() {
            None => {
                errors.push(format!("block {}: operator is required", n));
                continue;
            }
            Some(Err(_)) => {
                errors.push(format!(
                    "block {}: unknown operator '{}'",
                    n,
                    block.operator.as_deref().unwrap_or_default()
                ));
                continue;
            }
            Some(Ok(op)) => op,
        };

        match operator {
            BlockOperator::Operator | BlockOperator::Mode => {
                let empty = block.value.as_deref().map_or(true, |v| v.trim().is_empty());
                if empty {
                    errors.push(format!(
                        "block {}: operator '{}' requires a non-empty value",
                        n, operator
                    ));
                }
            }
            BlockOperator::NearPoint => {
                if ctx.point.is_none() {
                    errors.push(format!("block {}: near_point requires a selected point", n));
                }
                if let Some(d) = block.distance {
                    if !d.is_finite() || d < 0.0 {
                        errors.push(format!(
                            "block {}: near_point distance must be a finite number >= 0",
                            n
                        ));
                    }
                }
            }
            BlockOperator::TouchesBoundary | BlockOperator::InsideBoundary => {}
        }
    }

    errors
}

/// Validate and fail with every violation at once.
pub fn assert_valid(query: &SpatialQuery, ctx: &ExecutionContext) -> Result<(), ValidationError> {
    let errors = validate_query(query, ctx);
    if errors.is_empty() {
        Ok(())
    } else {
        tracing::debug!(violations = errors.len(), "query failed validation");
        Err(ValidationError::new(errors))
    }
}

fn is_polar(lat: f64) -> bool {
    lat.to_radians().cos().abs() < POLAR_COS_EPSILON
}
