//! Request and response types for repository operations.

use serde_json::Value;

use crate::errors::SearchIndexError;
use es_indexer_shared::{DocumentFailure, FieldValue};

/// A parameterized SQL statement.
///
/// Parameters are bound positionally to `?` markers.
#[derive(Debug, Clone, PartialEq)]
pub struct Statement {
    pub sql: String,
    pub params: Vec<FieldValue>,
}

impl Statement {
    pub fn new(sql: impl Into<String>, params: Vec<FieldValue>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

/// Raw response of a bulk write.
///
/// The status and body are kept as received; interpreting them is up to the
/// caller, since a `200` can still carry per-document failures.
#[derive(Debug, Clone, PartialEq)]
pub struct BulkResponse {
    /// HTTP status code.
    pub status: u16,
    /// Response body text.
    pub body: String,
}

impl BulkResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the search engine accepted the request as a whole.
    pub fn is_success(&self) -> bool {
        self.status == 200
    }

    /// Extract the per-document failures from a bulk response body.
    ///
    /// # Returns
    ///
    /// * `Ok(vec![])` - If the body reports `"errors": false`
    /// * `Ok(failures)` - One entry per rejected item, in batch order
    /// * `Err(SearchIndexError::ParseError)` - If the body is not JSON or has
    ///   no `errors` flag
    pub fn document_failures(&self) -> Result<Vec<DocumentFailure>, SearchIndexError> {
        let parsed: Value = serde_json::from_str(&self.body).map_err(|e| {
            SearchIndexError::parse(format!("bulk response is not JSON: {}", e))
        })?;

        let errors = parsed
            .get("errors")
            .and_then(Value::as_bool)
            .ok_or_else(|| SearchIndexError::parse("bulk response is missing key: errors"))?;

        if !errors {
            return Ok(Vec::new());
        }

        let items = parsed
            .get("items")
            .and_then(Value::as_array)
            .ok_or_else(|| SearchIndexError::parse("bulk response is missing key: items"))?;

        let failures = items
            .iter()
            .enumerate()
            .filter_map(|(position, item)| {
                // Each item is keyed by its action, e.g. {"index": {...}}.
                let result = item.as_object()?.values().next()?;
                let error = result.get("error")?;
                Some(DocumentFailure {
                    position,
                    id: result.get("_id").and_then(Value::as_str).map(str::to_string),
                    status: result
                        .get("status")
                        .and_then(Value::as_u64)
                        .and_then(|s| u16::try_from(s).ok())
                        .unwrap_or_default(),
                    error: describe_error(error),
                })
            })
            .collect();

        Ok(failures)
    }
}

fn describe_error(error: &Value) -> String {
    match (
        error.get("type").and_then(Value::as_str),
        error.get("reason").and_then(Value::as_str),
    ) {
        (Some(kind), Some(reason)) => format!("{}: {}", kind, reason),
        _ => error.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_no_failures_when_errors_false() {
        let response = BulkResponse::new(200, json!({"took": 3, "errors": false, "items": []}).to_string());
        assert!(response.is_success());
        assert!(response.document_failures().unwrap().is_empty());
    }

    #[test]
    fn test_failures_are_enumerated_in_batch_order() {
        let body = json!({
            "took": 7,
            "errors": true,
            "items": [
                {"index": {"_id": "1", "status": 201, "result": "created"}},
                {"index": {"_id": "2", "status": 400, "error": {
                    "type": "mapper_parsing_exception",
                    "reason": "failed to parse field [price]"
                }}},
                {"index": {"_id": "3", "status": 200, "result": "updated"}}
            ]
        });

        let failures = BulkResponse::new(200, body.to_string())
            .document_failures()
            .unwrap();

        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].position, 1);
        assert_eq!(failures[0].id.as_deref(), Some("2"));
        assert_eq!(failures[0].status, 400);
        assert_eq!(
            failures[0].error,
            "mapper_parsing_exception: failed to parse field [price]"
        );
    }

    #[test]
    fn test_missing_errors_flag_is_a_parse_error() {
        let response = BulkResponse::new(200, json!({"took": 1}).to_string());
        assert!(matches!(
            response.document_failures(),
            Err(SearchIndexError::ParseError(_))
        ));
    }

    #[test]
    fn test_non_json_body_is_a_parse_error() {
        let response = BulkResponse::new(200, "<html>gateway</html>");
        assert!(response.document_failures().is_err());
    }
}
