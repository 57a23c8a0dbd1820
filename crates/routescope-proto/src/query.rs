//! The declarative query model.
//!
//! A [`SpatialQuery`] describes "find X [intersecting|within D meters of] Y",
//! optionally refined by an ordered list of [`Block`]s. The model performs no
//! validation; validity is always relative to an execution context and is
//! checked by the validator in `routescope-lang`.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Default search radius in meters.
pub const DEFAULT_DISTANCE: f64 = 300.0;

/// What kind of feature the query returns.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Find {
    /// Transit routes.
    #[default]
    Routes,
    /// Transit stops.
    Stops,
}

impl Find {
    /// Wire name of this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Find::Routes => "routes",
            Find::Stops => "stops",
        }
    }
}

/// Spatial condition relating results to the target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Condition {
    /// Geometry lies within the target (or within a distance of it).
    Within,
    /// Geometry intersects the target (or its buffer). Unrecognized
    /// conditions fall back to this.
    #[default]
    #[serde(other)]
    Intersect,
}

impl Condition {
    /// Wire name of this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Condition::Intersect => "intersect",
            Condition::Within => "within",
        }
    }
}

/// What the main clause is measured against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Target {
    /// The point the user picked on the map.
    #[default]
    SelectedPoint,
    /// The boundary polygon supplied in the context.
    Boundary,
}

impl Target {
    /// Wire name of this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::SelectedPoint => "selected_point",
            Target::Boundary => "boundary",
        }
    }
}

/// How a supplemental clause combines with the expression built so far.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockType {
    /// `E AND C`.
    #[default]
    #[serde(rename = "include")]
    Include,
    /// `E AND NOT C`.
    #[serde(rename = "exclude")]
    Exclude,
    /// `E OR C`.
    #[serde(rename = "also-include")]
    AlsoInclude,
}

impl BlockType {
    /// Wire name of this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockType::Include => "include",
            BlockType::Exclude => "exclude",
            BlockType::AlsoInclude => "also-include",
        }
    }
}

impl FromStr for BlockType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "include" => Ok(BlockType::Include),
            "exclude" => Ok(BlockType::Exclude),
            "also-include" => Ok(BlockType::AlsoInclude),
            other => Err(Error::Deserialization(format!("unknown block type '{}'", other))),
        }
    }
}

impl fmt::Display for BlockType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The five recognized block operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlockOperator {
    /// Within `distance` meters of the selected point.
    NearPoint,
    /// Touches the boundary.
    TouchesBoundary,
    /// Fully inside the boundary.
    InsideBoundary,
    /// Operator attribute equals `value`.
    Operator,
    /// Mode attribute equals `value`.
    Mode,
}

impl BlockOperator {
    /// All recognized operators.
    pub const ALL: [BlockOperator; 5] = [
        BlockOperator::NearPoint,
        BlockOperator::TouchesBoundary,
        BlockOperator::InsideBoundary,
        BlockOperator::Operator,
        BlockOperator::Mode,
    ];

    /// Wire name of this value.
    pub fn as_str(&self) -> &'static str {
        match self {
            BlockOperator::NearPoint => "near_point",
            BlockOperator::TouchesBoundary => "touches_boundary",
            BlockOperator::InsideBoundary => "inside_boundary",
            BlockOperator::Operator => "operator",
            BlockOperator::Mode => "mode",
        }
    }

    /// Whether this operator compares an attribute against `value`.
    pub fn is_attribute(&self) -> bool {
        matches!(self, BlockOperator::Operator | BlockOperator::Mode)
    }
}

impl FromStr for BlockOperator {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        BlockOperator::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| Error::Deserialization(format!("unknown block operator '{}'", s)))
    }
}

impl fmt::Display for BlockOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A supplemental condition as the user entered it.
///
/// Blocks are kept in their loose wire form: `type` and `operator` are raw
/// strings and the payload fields are optional. The compiler resolves each
/// block into a typed clause once it has been validated, so nothing
/// downstream reads a field its operator does not define.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// One of `include`, `exclude`, `also-include`; absent means include.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub block_type: Option<String>,
    /// One of the five [`BlockOperator`] names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<String>,
    /// Attribute value for `operator` and `mode` blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    /// Radius in meters for `near_point` blocks.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub distance: Option<f64>,
}

impl Block {
    /// Create a block of the given type and operator.
    pub fn new(block_type: BlockType, operator: BlockOperator) -> Self {
        Self {
            block_type: Some(block_type.as_str().to_string()),
            operator: Some(operator.as_str().to_string()),
            value: None,
            distance: None,
        }
    }

    /// An `include` block.
    pub fn include(operator: BlockOperator) -> Self {
        Self::new(BlockType::Include, operator)
    }

    /// An `exclude` block.
    pub fn exclude(operator: BlockOperator) -> Self {
        Self::new(BlockType::Exclude, operator)
    }

    /// An `also-include` block.
    pub fn also_include(operator: BlockOperator) -> Self {
        Self::new(BlockType::AlsoInclude, operator)
    }

    /// Set the attribute value.
    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    /// Set the near-point radius.
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = Some(distance);
        self
    }

    /// Parse the operator, if present.
    pub fn parsed_operator(&self) -> Option<Result<BlockOperator, Error>> {
        self.operator.as_deref().map(BlockOperator::from_str)
    }

    /// Parse the block type, defaulting to include when absent.
    pub fn parsed_type(&self) -> Result<BlockType, Error> {
        match self.block_type.as_deref() {
            None => Ok(BlockType::Include),
            Some(s) => s.parse(),
        }
    }
}

/// A declarative spatial query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpatialQuery {
    /// What to return.
    pub find: Find,
    /// How results relate to the target.
    pub condition: Condition,
    /// Radius in meters for the main clause.
    pub distance: f64,
    /// What the main clause measures against.
    pub target: Target,
    /// Ordered supplemental conditions.
    pub blocks: Vec<Block>,
}

impl Default for SpatialQuery {
    fn default() -> Self {
        Self {
            find: Find::Routes,
            condition: Condition::Intersect,
            distance: DEFAULT_DISTANCE,
            target: Target::SelectedPoint,
            blocks: Vec::new(),
        }
    }
}

impl SpatialQuery {
    /// Create a query with default settings: routes intersecting a 300 m
    /// buffer around the selected point.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set what to find.
    pub fn with_find(mut self, find: Find) -> Self {
        self.find = find;
        self
    }

    /// Set the condition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.condition = condition;
        self
    }

    /// Set the main-clause radius in meters.
    pub fn with_distance(mut self, distance: f64) -> Self {
        self.distance = distance;
        self
    }

    /// Set the target.
    pub fn with_target(mut self, target: Target) -> Self {
        self.target = target;
        self
    }

    /// Append a supplemental block.
    pub fn with_block(mut self, block: Block) -> Self {
        self.blocks.push(block);
        self
    }

    /// Replace the supplemental blocks.
    ///
    /// The query takes ownership of the blocks, so later changes to the
    /// caller's data cannot alias into the model.
    pub fn with_blocks(mut self, blocks: Vec<Block>) -> Self {
        self.blocks = blocks;
        self
    }

    /// Encode to a plain JSON value.
    pub fn to_value(&self) -> Result<serde_json::Value, Error> {
        serde_json::to_value(self).map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Decode from a plain JSON value. Missing fields take their defaults.
    pub fn from_value(value: serde_json::Value) -> Result<Self, Error> {
        serde_json::from_value(value).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Human-readable summary for display purposes.
    pub fn describe(&self) -> String {
        let target = match self.target {
            Target::SelectedPoint => "the selected point",
            Target::Boundary => "the boundary",
        };
        let mut text = match (self.condition, self.target) {
            (Condition::Within, Target::SelectedPoint) => {
                format!("Find {} within {}m of {}", self.find.as_str(), self.distance, target)
            }
            (Condition::Within, Target::Boundary) => {
                format!("Find {} within {}", self.find.as_str(), target)
            }
            (Condition::Intersect, _) => {
                format!("Find {} intersecting {}", self.find.as_str(), target)
            }
        };

        for block in &self.blocks {
            let verb = match block.parsed_type() {
                Ok(BlockType::Exclude) => "excluding",
                Ok(BlockType::AlsoInclude) => "also including",
                _ => "including",
            };
            let what = match block.parsed_operator() {
                Some(Ok(BlockOperator::NearPoint)) => {
                    format!("near the point ({}m)", block.distance.unwrap_or(self.distance))
                }
                Some(Ok(BlockOperator::TouchesBoundary)) => "touching the boundary".to_string(),
                Some(Ok(BlockOperator::InsideBoundary)) => "inside the boundary".to_string(),
                Some(Ok(op @ (BlockOperator::Operator | BlockOperator::Mode))) => format!(
                    "{} = {}",
                    op.as_str(),
                    block.value.as_deref().unwrap_or("any")
                ),
                Some(Err(_)) | None => "an unrecognized condition".to_string(),
            };
            text.push_str(&format!(", {} {}", verb, what));
        }

        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let q = SpatialQuery::new();
        assert_eq!(q.find, Find::Routes);
        assert_eq!(q.condition, Condition::Intersect);
        assert_eq!(q.distance, 300.0);
        assert_eq!(q.target, Target::SelectedPoint);
        assert!(q.blocks.is_empty());
    }

    #[test]
    fn test_missing_fields_take_defaults() {
        let q = SpatialQuery::from_value(serde_json::json!({ "find": "stops" })).unwrap();
        assert_eq!(q.find, Find::Stops);
        assert_eq!(q.distance, DEFAULT_DISTANCE);
    }

    #[test]
    fn test_unknown_condition_is_intersect() {
        let q = SpatialQuery::from_value(serde_json::json!({ "condition": "overlaps" })).unwrap();
        assert_eq!(q.condition, Condition::Intersect);
    }

    #[test]
    fn test_block_wire_names() {
        let block = Block::also_include(BlockOperator::NearPoint).with_distance(1000.0);
        let json = serde_json::to_value(&block).unwrap();
        assert_eq!(json["type"], "also-include");
        assert_eq!(json["operator"], "near_point");
        assert!(json.get("value").is_none());
    }

    #[test]
    fn test_block_type_defaults_to_include() {
        let block = Block {
            operator: Some("mode".into()),
            ..Block::default()
        };
        assert_eq!(block.parsed_type().unwrap(), BlockType::Include);
    }

    #[test]
    fn test_unknown_operator_parse() {
        let block = Block {
            operator: Some("teleport".into()),
            ..Block::default()
        };
        assert!(matches!(block.parsed_operator(), Some(Err(_))));
    }

    #[test]
    fn test_describe() {
        let q = SpatialQuery::new()
            .with_condition(Condition::Within)
            .with_block(Block::exclude(BlockOperator::Mode).with_value("Rail"));
        assert_eq!(
            q.describe(),
            "Find routes within 300m of the selected point, excluding mode = Rail"
        );
    }
}
