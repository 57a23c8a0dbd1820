//! The compiled-query contract.
//!
//! A [`CompiledQuery`] is produced once by the compiler and never mutated.
//! Its `blocks` list always starts with the main clause, derived from the
//! query's own `target`/`condition`/`distance`; every following entry is a
//! supplemental clause resolved from a validated block.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::context::Boundary;
use crate::error::Error;
use crate::query::{BlockOperator, BlockType, Find, Target};
use crate::CONTRACT_VERSION;

/// Spatial relation of the main clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relation {
    /// Geometry intersects a buffer of the radius.
    Intersects,
    /// Distance to the geometry is at most the radius. Unrecognized
    /// relations are read as this.
    #[serde(other)]
    Within,
}

impl Relation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Relation::Within => "within",
            Relation::Intersects => "intersects",
        }
    }
}

/// The main clause, always at index 0.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MainClause {
    pub target: Target,
    pub distance: f64,
    pub relation: Relation,
}

/// A resolved supplemental condition.
///
/// Each variant carries exactly the payload its operator defines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "operator", rename_all = "snake_case")]
pub enum ClauseKind {
    /// Within `distance` meters of the selected point.
    NearPoint { distance: f64 },
    /// Touches the boundary.
    TouchesBoundary,
    /// Fully inside the boundary.
    InsideBoundary,
    /// Operator attribute equals `value`.
    Operator { value: String },
    /// Mode attribute equals `value`.
    Mode { value: String },
}

impl ClauseKind {
    /// The operator this clause was resolved from.
    pub fn operator(&self) -> BlockOperator {
        match self {
            ClauseKind::NearPoint { .. } => BlockOperator::NearPoint,
            ClauseKind::TouchesBoundary => BlockOperator::TouchesBoundary,
            ClauseKind::InsideBoundary => BlockOperator::InsideBoundary,
            ClauseKind::Operator { .. } => BlockOperator::Operator,
            ClauseKind::Mode { .. } => BlockOperator::Mode,
        }
    }
}

/// A supplemental clause at index 1 or later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SupplementalClause {
    #[serde(rename = "type")]
    pub block_type: BlockType,
    #[serde(flatten)]
    pub clause: ClauseKind,
}

impl SupplementalClause {
    pub fn new(block_type: BlockType, clause: ClauseKind) -> Self {
        Self { block_type, clause }
    }
}

/// One entry of the compiled block list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CompiledBlock {
    Main(MainClause),
    Supplemental(SupplementalClause),
}

/// Capability booleans captured at compile time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContextSnapshot {
    pub has_point: bool,
    pub has_boundary: bool,
    pub spatial_ready: bool,
}

/// Compile-time metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompileMetadata {
    pub compiled_at: DateTime<Utc>,
    pub context: ContextSnapshot,
}

/// A validated, normalized query ready for predicate building.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompiledQuery {
    /// Contract version, see [`CONTRACT_VERSION`].
    pub version: String,
    pub find: Find,
    /// Main clause first, then supplemental clauses in input order.
    pub blocks: Vec<CompiledBlock>,
    pub boundary: Option<Boundary>,
    pub metadata: CompileMetadata,
    /// Digest of the logical query; used as the cache key.
    pub hash: String,
}

impl CompiledQuery {
    /// The main clause, if the block list is well formed.
    pub fn main_clause(&self) -> Option<&MainClause> {
        match self.blocks.first() {
            Some(CompiledBlock::Main(main)) => Some(main),
            _ => None,
        }
    }

    /// Supplemental clauses in order.
    pub fn supplemental(&self) -> impl Iterator<Item = &SupplementalClause> {
        self.blocks.iter().skip(1).filter_map(|b| match b {
            CompiledBlock::Supplemental(s) => Some(s),
            CompiledBlock::Main(_) => None,
        })
    }

    /// Whether this contract's major version matches the one this crate
    /// understands.
    pub fn is_compatible(&self) -> bool {
        major(&self.version) == major(CONTRACT_VERSION)
    }

    /// Encode as JSON text.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode from JSON text.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }
}

fn major(version: &str) -> &str {
    version.split('.').next().unwrap_or(version)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> CompiledQuery {
        CompiledQuery {
            version: CONTRACT_VERSION.to_string(),
            find: Find::Routes,
            blocks: vec![
                CompiledBlock::Main(MainClause {
                    target: Target::SelectedPoint,
                    distance: 300.0,
                    relation: Relation::Within,
                }),
                CompiledBlock::Supplemental(SupplementalClause::new(
                    BlockType::Exclude,
                    ClauseKind::Mode {
                        value: "Rail".into(),
                    },
                )),
                CompiledBlock::Supplemental(SupplementalClause::new(
                    BlockType::AlsoInclude,
                    ClauseKind::NearPoint { distance: 1000.0 },
                )),
                CompiledBlock::Supplemental(SupplementalClause::new(
                    BlockType::Include,
                    ClauseKind::TouchesBoundary,
                )),
            ],
            boundary: Some(Boundary::wkt("POLYGON((0 0, 1 0, 1 1, 0 0))")),
            metadata: CompileMetadata {
                compiled_at: Utc::now(),
                context: ContextSnapshot {
                    has_point: true,
                    has_boundary: true,
                    spatial_ready: true,
                },
            },
            hash: "0123456789abcdef".into(),
        }
    }

    #[test]
    fn test_json_roundtrip_unchanged() {
        let compiled = sample();
        let json = compiled.to_json().unwrap();
        assert_eq!(CompiledQuery::from_json(&json).unwrap(), compiled);
    }

    #[test]
    fn test_wire_shape() {
        let value = serde_json::to_value(sample()).unwrap();
        assert_eq!(value["version"], "1.0.0");
        assert_eq!(value["blocks"][0]["target"], "selected_point");
        assert_eq!(value["blocks"][0]["relation"], "within");
        assert_eq!(value["blocks"][1]["type"], "exclude");
        assert_eq!(value["blocks"][1]["operator"], "mode");
        assert_eq!(value["blocks"][1]["value"], "Rail");
        assert_eq!(value["blocks"][2]["distance"], 1000.0);
        assert_eq!(value["metadata"]["context"]["spatial_ready"], true);
    }

    #[test]
    fn test_unknown_relation_reads_as_within() {
        let main: MainClause = serde_json::from_value(serde_json::json!({
            "target": "selected_point",
            "distance": 10.0,
            "relation": "crosses"
        }))
        .unwrap();
        assert_eq!(main.relation, Relation::Within);
    }

    #[test]
    fn test_accessors() {
        let compiled = sample();
        assert_eq!(compiled.main_clause().unwrap().distance, 300.0);
        assert_eq!(compiled.supplemental().count(), 3);
        assert!(compiled.is_compatible());
    }
}
