//! Compiler from the query model to the compiled-query contract.

use chrono::Utc;
use routescope_proto::{
    Block, BlockOperator, ClauseKind, CompileMetadata, CompiledBlock, CompiledQuery, Condition,
    ContextSnapshot, ExecutionContext, MainClause, Relation, SpatialQuery, SupplementalClause,
    CONTRACT_VERSION,
};

use crate::error::{CompileError, ValidationError};
use crate::hash::query_hash;
use crate::validator::assert_valid;

/// Compiler for spatial queries.
pub struct Compiler;

impl Compiler {
    /// Validate and compile a query.
    ///
    /// Invalid queries are never compiled: every violation is returned as a
    /// [`CompileError::Validation`].
    pub fn compile(query: &SpatialQuery, ctx: &ExecutionContext) -> Result<CompiledQuery, CompileError> {
        assert_valid(query, ctx)?;

        let mut blocks = Vec::with_capacity(query.blocks.len() + 1);
        blocks.push(CompiledBlock::Main(Self::compile_main(query)));
        for block in &query.blocks {
            blocks.push(CompiledBlock::Supplemental(Self::compile_block(block, query.distance)?));
        }

        let hash = query_hash(query)?;
        tracing::debug!(hash = %hash, blocks = blocks.len(), "compiled query");

        Ok(CompiledQuery {
            version: CONTRACT_VERSION.to_string(),
            find: query.find,
            blocks,
            boundary: ctx.boundary.clone(),
            metadata: CompileMetadata {
                compiled_at: Utc::now(),
                context: ContextSnapshot {
                    has_point: ctx.has_point(),
                    has_boundary: ctx.has_boundary(),
                    spatial_ready: ctx.spatial_ready,
                },
            },
            hash,
        })
    }

    /// The main clause comes from the query's own fields, never from a block.
    fn compile_main(query: &SpatialQuery) -> MainClause {
        let relation = match query.condition {
            Condition::Within => Relation::Within,
            Condition::Intersect => Relation::Intersects,
        };
        MainClause {
            target: query.target,
            distance: query.distance,
            relation,
        }
    }

    /// Resolve a validated block into its typed clause.
    ///
    /// A `near_point` block without its own radius inherits the query's.
    pub(crate) fn compile_block(block: &Block, default_distance: f64) -> Result<SupplementalClause, CompileError> {
        let block_type = block.parsed_type().map_err(|e| invalid(e.to_string()))?;
        let operator = match block.parsed_operator() {
            Some(Ok(op)) => op,
            Some(Err(e)) => return Err(invalid(e.to_string())),
            None => return Err(invalid("operator is required")),
        };

        let value = || block.value.clone().unwrap_or_default();
        let clause = match operator {
            BlockOperator::NearPoint => ClauseKind::NearPoint {
                distance: block.distance.unwrap_or(default_distance),
            },
            BlockOperator::TouchesBoundary => ClauseKind::TouchesBoundary,
            BlockOperator::InsideBoundary => ClauseKind::InsideBoundary,
            BlockOperator::Operator => ClauseKind::Operator { value: value() },
            BlockOperator::Mode => ClauseKind::Mode { value: value() },
        };

        Ok(SupplementalClause::new(block_type, clause))
    }
}

fn invalid(message: impl Into<String>) -> CompileError {
    CompileError::Validation(ValidationError::new(vec![message.into()]))
}

/// Validate and compile a query.
pub fn compile_query(query: &SpatialQuery, ctx: &ExecutionContext) -> Result<CompiledQuery, CompileError> {
    Compiler::compile(query, ctx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use routescope_proto::{BlockType, Boundary, Target};

    fn ctx() -> ExecutionContext {
        ExecutionContext::new()
            .with_service_id_field("service_id")
            .with_native_geometry("geometry")
            .with_point(55.9533, -3.1883)
    }

    #[test]
    fn test_condition_maps_to_relation() {
        let within = compile_query(&SpatialQuery::new().with_condition(Condition::Within), &ctx()).unwrap();
        assert_eq!(within.main_clause().unwrap().relation, Relation::Within);

        let intersect = compile_query(&SpatialQuery::new(), &ctx()).unwrap();
        assert_eq!(intersect.main_clause().unwrap().relation, Relation::Intersects);
    }

    #[test]
    fn test_block_type_defaults_to_include() {
        let block = Block {
            operator: Some("mode".into()),
            value: Some("Ferry".into()),
            ..Block::default()
        };
        let compiled = compile_query(&SpatialQuery::new().with_block(block), &ctx()).unwrap();
        let clause = compiled.supplemental().next().unwrap();
        assert_eq!(clause.block_type, BlockType::Include);
        assert_eq!(clause.clause, ClauseKind::Mode { value: "Ferry".into() });
    }

    #[test]
    fn test_near_point_inherits_distance() {
        let query = SpatialQuery::new()
            .with_distance(450.0)
            .with_block(Block::include(BlockOperator::NearPoint));
        let compiled = compile_query(&query, &ctx()).unwrap();
        assert_eq!(
            compiled.supplemental().next().unwrap().clause,
            ClauseKind::NearPoint { distance: 450.0 }
        );
    }

    #[test]
    fn test_snapshot_and_boundary() {
        let ctx = ctx().with_boundary(Boundary::wkt("POLYGON((0 0, 1 0, 1 1, 0 0))"));
        let compiled = compile_query(&SpatialQuery::new().with_target(Target::Boundary), &ctx).unwrap();
        assert!(compiled.metadata.context.has_point);
        assert!(compiled.metadata.context.has_boundary);
        assert!(compiled.metadata.context.spatial_ready);
        assert!(compiled.boundary.is_some());
        assert_eq!(compiled.version, "1.0.0");
    }

    #[test]
    fn test_invalid_query_not_compiled() {
        let err = compile_query(&SpatialQuery::new(), &ExecutionContext::new()).unwrap_err();
        assert_eq!(err.violations().unwrap().len(), 2);
    }
}
