//! Result contract returned by the execution service.

use serde::{Deserialize, Serialize};

/// Outcome of one query execution.
///
/// On success `service_ids` and `count` are set; on failure either `error`
/// (a single fatal message) or `errors` (every validation violation) is set.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub service_ids: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub count: Option<usize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
}

impl QueryResult {
    /// A successful result.
    pub fn success(service_ids: Vec<String>) -> Self {
        Self {
            success: true,
            count: Some(service_ids.len()),
            service_ids: Some(service_ids),
            ..Self::default()
        }
    }

    /// A failed result with a single message.
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: Some(error.into()),
            ..Self::default()
        }
    }

    /// A failed result listing every validation violation.
    pub fn invalid(errors: Vec<String>) -> Self {
        Self {
            success: false,
            errors: Some(errors),
            ..Self::default()
        }
    }

    /// Matched identifiers, empty on failure.
    pub fn ids(&self) -> &[String] {
        self.service_ids.as_deref().unwrap_or(&[])
    }

    /// All failure messages, joined.
    pub fn message(&self) -> Option<String> {
        match (&self.error, &self.errors) {
            (Some(e), _) => Some(e.clone()),
            (None, Some(errs)) => Some(errs.join("; ")),
            (None, None) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_shape() {
        let result = QueryResult::success(vec!["a".into(), "b".into()]);
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json, serde_json::json!({ "success": true, "serviceIds": ["a", "b"], "count": 2 }));
    }

    #[test]
    fn test_failure_shapes() {
        let json = serde_json::to_value(QueryResult::failure("boom")).unwrap();
        assert_eq!(json, serde_json::json!({ "success": false, "error": "boom" }));

        let invalid = QueryResult::invalid(vec!["x".into(), "y".into()]);
        assert_eq!(invalid.message().as_deref(), Some("x; y"));
        assert!(invalid.ids().is_empty());
    }
}
