//! Public request, response and error types of the search service.

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;

use crate::registry::RegistryError;
use crate::search::ValidationError;
use crate::storage::StorageError;

/// Errors returned to callers of [`super::SearchService`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ApiError {
    #[error("Invalid request ({} field errors)", .0.len())]
    Validation(Vec<ValidationError>),
    #[error("Authentication credentials were not provided.")]
    Unauthenticated,
    #[error("Missing permission '{permission}'")]
    Forbidden { permission: String },
    #[error("Unable to apply filtering for autocomplete search request")]
    AutocompleteFilteringUnsupported,
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl ApiError {
    /// HTTP status an API layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            ApiError::Validation(_) => 400,
            ApiError::Unauthenticated => 401,
            ApiError::Forbidden { .. } => 403,
            ApiError::AutocompleteFilteringUnsupported => 400,
            ApiError::Registry(RegistryError::NotFound(_)) => 404,
            ApiError::Registry(_) => 500,
            ApiError::Storage(StorageError::NotFound(_)) => 503,
            ApiError::Storage(_) => 502,
        }
    }

    /// Response body. Validation errors are grouped by field:
    /// `{"archived": ["\"maybe\" is not a valid boolean."]}`.
    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation(errors) => {
                let mut fields: Map<String, Value> = Map::new();
                for error in errors {
                    let entry = fields
                        .entry(error.field.clone())
                        .or_insert_with(|| Value::Array(Vec::new()));
                    if let Value::Array(messages) = entry {
                        messages.push(Value::String(error.message.clone()));
                    }
                }
                Value::Object(fields)
            }
            other => json!({ "detail": other.to_string() }),
        }
    }
}

/// One page of search results.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchResponse {
    /// Total number of matches, not just this page
    pub count: u64,
    pub results: Vec<Value>,
}

impl SearchResponse {
    pub fn empty() -> Self {
        Self::default()
    }
}

/// Every match of an export, one row per document in column order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ExportTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl ExportTable {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutocompleteRequest {
    pub term: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

impl AutocompleteRequest {
    pub fn new(term: impl Into<String>) -> Self {
        Self {
            term: term.into(),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_body_groups_by_field() {
        let err = ApiError::Validation(vec![
            ValidationError::new("archived", "Must be a valid boolean."),
            ValidationError::new("sortby", "\"colour\" is not a valid choice."),
            ValidationError::new("archived", "Second problem."),
        ]);
        assert_eq!(err.status_code(), 400);
        assert_eq!(
            err.body(),
            json!({
                "archived": ["Must be a valid boolean.", "Second problem."],
                "sortby": ["\"colour\" is not a valid choice."],
            })
        );
    }

    #[test]
    fn test_status_codes() {
        assert_eq!(ApiError::Unauthenticated.status_code(), 401);
        assert_eq!(ApiError::Forbidden { permission: "x".into() }.status_code(), 403);
        assert_eq!(ApiError::Registry(RegistryError::NotFound("x".into())).status_code(), 404);
        assert_eq!(
            ApiError::AutocompleteFilteringUnsupported.body(),
            json!({"detail": "Unable to apply filtering for autocomplete search request"})
        );
    }
}
