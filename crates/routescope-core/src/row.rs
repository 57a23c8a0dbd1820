//! Result rows and identifier extraction.

use serde_json::{Map, Value};

/// A result row keyed by column name.
pub type Row = Map<String, Value>;

/// Stringify an identifier cell.
///
/// Strings are kept as-is (case preserved); numbers and booleans use their
/// JSON text. Null, arrays and objects are not identifiers.
pub fn id_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Identifier of a row under `field`, if present and scalar.
pub fn row_id(row: &Row, field: &str) -> Option<String> {
    row.get(field).and_then(id_to_string)
}

/// Collect identifiers in first-seen order, dropping duplicates.
pub fn dedup_ids<I>(ids: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = std::collections::HashSet::new();
    ids.into_iter().filter(|id| seen.insert(id.clone())).collect()
}
