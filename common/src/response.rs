//! API response envelopes.
//!
//! Every body carries a `status` field; the remaining fields depend on the endpoint.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::query::Row;

/// Successful query response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QueryResponse {
    /// Always `"success"`.
    pub status: String,

    /// Result rows in the order the warehouse returned them.
    #[schema(value_type = Vec<Object>)]
    pub results: Vec<Row>,

    /// Number of rows in `results`.
    pub row_count: usize,
}

impl QueryResponse {
    /// Wraps result rows; `row_count` always matches the row list.
    pub fn success(results: Vec<Row>) -> Self {
        Self {
            status: "success".to_string(),
            row_count: results.len(),
            results,
        }
    }
}

/// Health-check response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    /// `"healthy"` or `"unhealthy"`.
    pub status: String,
    pub message: String,
}

impl HealthResponse {
    pub fn healthy(message: impl Into<String>) -> Self {
        Self {
            status: "healthy".to_string(),
            message: message.into(),
        }
    }

    pub fn unhealthy(message: impl Into<String>) -> Self {
        Self {
            status: "unhealthy".to_string(),
            message: message.into(),
        }
    }
}

/// Error response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `"error"`.
    pub status: String,

    /// Human-readable error message.
    pub message: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_empty_result_envelope() {
        let body = serde_json::to_value(QueryResponse::success(vec![])).unwrap();
        assert_eq!(body, json!({"status": "success", "results": [], "row_count": 0}));
    }

    #[test]
    fn test_row_count_matches_results() {
        let rows: Vec<Row> = (1..=3)
            .map(|i| {
                let mut row = Row::new();
                row.insert("N".into(), json!(i));
                row
            })
            .collect();
        let response = QueryResponse::success(rows);
        assert_eq!(response.row_count, 3);
        assert_eq!(response.results[2]["N"], json!(3));
    }

    #[test]
    fn test_health_statuses() {
        assert_eq!(HealthResponse::healthy("ok").status, "healthy");
        assert_eq!(HealthResponse::unhealthy("down").status, "unhealthy");
    }
}
