//! Content hash of a logical query.

use routescope_proto::{Block, Condition, Find, SpatialQuery, SupplementalClause, Target};
use serde::Serialize;

use crate::compiler::Compiler;
use crate::error::CompileError;

/// Number of digest bytes kept in the hex key.
const HASH_BYTES: usize = 8;

/// The parts of a query that decide what it matches.
#[derive(Serialize)]
struct Canonical<'a> {
    find: Find,
    condition: Condition,
    distance: f64,
    target: Target,
    blocks: Vec<CanonicalBlock<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum CanonicalBlock<'a> {
    Resolved(SupplementalClause),
    /// A block that does not resolve is keyed by its raw fields.
    Raw(&'a Block),
}

impl<'a> Canonical<'a> {
    fn new(query: &'a SpatialQuery) -> Self {
        let blocks = query
            .blocks
            .iter()
            .map(|block| match Compiler::compile_block(block, query.distance) {
                Ok(clause) => CanonicalBlock::Resolved(clause),
                Err(_) => CanonicalBlock::Raw(block),
            })
            .collect();
        Self {
            find: query.find,
            condition: query.condition,
            distance: query.distance,
            target: query.target,
            blocks,
        }
    }
}

/// Stable digest of `{find, condition, distance, target, blocks}`.
///
/// Blocks are keyed by the clause they resolve to, so payload a block's
/// operator ignores (a distance on a `mode` block, a value on
/// `near_point`) and an omitted `type` versus `"include"` leave the key
/// unchanged. The canonical form is encoded as JSON with a fixed field
/// order and hashed with BLAKE3; the first eight bytes are returned as
/// lowercase hex.
pub fn query_hash(query: &SpatialQuery) -> Result<String, CompileError> {
    let canonical = serde_json::to_vec(&Canonical::new(query))
        .map_err(|e| CompileError::Hash(e.to_string()))?;
    let digest = blake3::hash(&canonical);
    Ok(hex::encode(&digest.as_bytes()[..HASH_BYTES]))
}

#[cfg(test)]
mod tests {
    use super::*;
    use routescope_proto::BlockOperator;

    fn hash(query: &SpatialQuery) -> String {
        query_hash(query).unwrap()
    }

    #[test]
    fn test_equal_queries_hash_equal() {
        let a = SpatialQuery::new().with_block(Block::include(BlockOperator::Mode).with_value("Bus"));
        let b = SpatialQuery::new().with_block(Block::include(BlockOperator::Mode).with_value("Bus"));
        assert_eq!(hash(&a), hash(&b));
    }

    #[test]
    fn test_hash_shape() {
        let h = hash(&SpatialQuery::new());
        assert_eq!(h.len(), HASH_BYTES * 2);
        assert!(h.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_any_field_changes_hash() {
        let base = hash(&SpatialQuery::new());
        let variants = [
            SpatialQuery::new().with_condition(Condition::Within),
            SpatialQuery::new().with_distance(301.0),
            SpatialQuery::new().with_block(Block::exclude(BlockOperator::Mode).with_value("Rail")),
        ];
        for q in variants {
            assert_ne!(hash(&q), base);
        }
    }

    #[test]
    fn test_ignored_block_payload_keeps_hash() {
        let mode = Block::include(BlockOperator::Mode).with_value("Bus");
        assert_eq!(
            hash(&SpatialQuery::new().with_block(mode.clone())),
            hash(&SpatialQuery::new().with_block(mode.with_distance(50.0))),
        );

        let near = Block::include(BlockOperator::NearPoint).with_distance(800.0);
        assert_eq!(
            hash(&SpatialQuery::new().with_block(near.clone())),
            hash(&SpatialQuery::new().with_block(near.with_value("stray"))),
        );
    }

    #[test]
    fn test_missing_type_hashes_as_include() {
        let explicit: SpatialQuery = serde_json::from_value(serde_json::json!({
            "blocks": [{"type": "include", "operator": "mode", "value": "Bus"}]
        }))
        .unwrap();
        let implicit: SpatialQuery = serde_json::from_value(serde_json::json!({
            "blocks": [{"operator": "mode", "value": "Bus"}]
        }))
        .unwrap();
        assert_eq!(hash(&explicit), hash(&implicit));
    }

    #[test]
    fn test_block_value_and_radius_change_hash() {
        let bus = SpatialQuery::new().with_block(Block::include(BlockOperator::Mode).with_value("Bus"));
        let rail = SpatialQuery::new().with_block(Block::include(BlockOperator::Mode).with_value("Rail"));
        assert_ne!(hash(&bus), hash(&rail));

        let near = |d| SpatialQuery::new().with_block(Block::include(BlockOperator::NearPoint).with_distance(d));
        assert_ne!(hash(&near(800.0)), hash(&near(500.0)));
    }
}
